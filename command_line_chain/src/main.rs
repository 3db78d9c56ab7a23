//! # Chain console
//!
//! Interactive console which sends telecommands to the chain executable. Enter `help` for the
//! list of commands.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

mod cmd;
mod tc_client;

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use color_eyre::{
    eyre::{eyre, WrapErr},
    Result,
};
use rustyline::{error::ReadlineError, history::DefaultHistory, Editor};
use std::{
    thread,
    time::{Duration, Instant},
};
use structopt::StructOpt;

use cmd::Cmd;
use comms_if::{
    net::zmq,
    tc::{chain_ctrl::GoalId, Tc, TcResponse},
};
use tc_client::{TcClient, TcClientError};

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

const PROMPT: &str = "Chain $ ";

/// Interval between goal status requests while waiting for a goal.
const GOAL_POLL_PERIOD: Duration = Duration::from_millis(100);

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, StructOpt)]
#[structopt(name = "command_line_chain", about = "Operator console for the chain executable")]
struct Opts {
    /// Telecommand endpoint of the chain executable
    #[structopt(short, long, default_value = "tcp://localhost:5030")]
    endpoint: String,

    /// File the command history is kept in
    #[structopt(long, default_value = "data/history.txt")]
    history: String,

    /// Give up waiting for a goal after this many seconds
    #[structopt(long)]
    goal_timeout_s: Option<f64>,
}

// ------------------------------------------------------------------------------------------------
// MAIN
// ------------------------------------------------------------------------------------------------

fn main() -> Result<()> {
    color_eyre::install()?;

    let opts = Opts::from_args();
    let goal_timeout = goal_timeout(opts.goal_timeout_s)?;

    let zmq_ctx = zmq::Context::new();
    let client =
        TcClient::new(&zmq_ctx, &opts.endpoint).wrap_err("Failed to initialise the TcClient")?;

    let mut rl = Editor::<(), DefaultHistory>::new().wrap_err("Failed to create the line editor")?;
    if rl.load_history(&opts.history).is_err() {
        println!("No history detected");
    }

    loop {
        let line = match rl.readline(PROMPT) {
            Ok(line) => line,
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
            Err(e) => {
                println!("Unhandled Error: {:?}", e);
                break;
            }
        };
        rl.add_history_entry(line.as_str());

        let cmd = match Cmd::parse_line(&line) {
            Ok(Some(c)) => c,
            Ok(None) => continue,
            Err(e) => {
                println!("{}", e);
                continue;
            }
        };

        if cmd == Cmd::Exit {
            break;
        }

        if let Err(e) = exec(&client, &cmd, goal_timeout) {
            println!("Error: {}", e);
        }
    }

    println!("Exiting...");

    if let Err(e) = rl.save_history(&opts.history) {
        println!("Could not save the history: {}", e);
    }

    Ok(())
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Convert the `--goal-timeout-s` option into a duration.
fn goal_timeout(seconds: Option<f64>) -> Result<Option<Duration>> {
    match seconds {
        Some(s) if !(s.is_finite() && s >= 0.0) => Err(eyre!(
            "--goal-timeout-s must be a finite, non-negative number of seconds, got {}",
            s
        )),
        Some(s) if s >= u64::MAX as f64 => Ok(None),
        Some(s) => Ok(Some(Duration::from_secs_f64(s))),
        None => Ok(None),
    }
}

/// Send the telecommand for `cmd` and print the response.
fn exec(client: &TcClient, cmd: &Cmd, goal_timeout: Option<Duration>) -> Result<()> {
    let tc = match cmd.to_tc()? {
        Some(tc) => tc,
        None => return Ok(()),
    };

    let response = client.send(&tc)?;
    print_response(&response);

    // Wait for the goal unless asked not to
    if let (Cmd::Goal { no_wait: false, .. }, TcResponse::GoalAccepted { goal_id }) =
        (cmd, &response)
    {
        wait_for_goal(client, *goal_id, goal_timeout)?;
    }

    Ok(())
}

/// Poll the goal's status until it finishes.
fn wait_for_goal(
    client: &TcClient,
    goal_id: GoalId,
    timeout: Option<Duration>,
) -> Result<(), TcClientError> {
    println!("Waiting for goal {}...", goal_id);
    let start = Instant::now();

    loop {
        match client.send(&Tc::GoalStatus { goal_id })? {
            TcResponse::GoalStatus(status) if status.is_terminal() => {
                print_response(&TcResponse::GoalStatus(status));
                return Ok(());
            }
            TcResponse::GoalStatus(_) => (),
            r => {
                print_response(&r);
                return Ok(());
            }
        }

        if let Some(t) = timeout {
            if start.elapsed() >= t {
                println!("Timed out waiting for goal {}", goal_id);
                return Ok(());
            }
        }

        thread::sleep(GOAL_POLL_PERIOD);
    }
}

fn print_response(response: &TcResponse) {
    match response {
        TcResponse::Ok => println!("Ok"),
        TcResponse::Failed { error_message } => println!("Failed: {}", error_message),
        TcResponse::GoalAccepted { goal_id } => println!("Goal {} accepted", goal_id),
        TcResponse::GoalRejected { reason } => println!("Goal rejected: {}", reason),
        TcResponse::GoalStatus(s) => match s.message {
            Some(ref m) => println!("Goal {}: {:?} ({})", s.id, s.state, m),
            None => println!("Goal {}: {:?}", s.id, s.state),
        },
        TcResponse::Invalid => println!("The server could not parse the telecommand"),
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------
