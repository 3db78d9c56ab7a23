//! # Actuator Chain Control Executable
//!
//! Drives a multi-joint actuator chain from trajectory goals and direct velocity commands.
//!
//! # Architecture
//!
//! The general execution methodology consists of:
//!
//!     - Initialise the session, logging and parameters
//!     - Create the actuator chain (simulated or remote) and the chain controller
//!     - Start the telecommand server on its own thread
//!     - Main loop:
//!         - Chain control processing (one tick)
//!         - Telemetry publishing, while the chain is initialised
//!         - Archiving of finished goals
//!     - On Ctrl-C, stop the chain and close the session

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

// External
use color_eyre::{eyre::WrapErr, Result};
use log::{error, info, warn};
use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread,
    time::Instant,
};

// Internal
use chain_lib::{
    actuator::{ActuatorChain, MechChain, SimChain},
    chain_ctrl::{self, InitData},
    controller::ChainController,
    params::{ActuatorKind, ChainExecParams, ChainFileParams},
    tc_server::TcServer,
    tm_server::{TmPacket, TmServer},
};
use comms_if::net::{zmq, NetParams};
use util::{
    logger::{logger_init, LevelFilter},
    session::{self, Session},
    time::seconds_to_std,
};

// ------------------------------------------------------------------------------------------------
// MAIN
// ------------------------------------------------------------------------------------------------

/// Executable main function, entry point.
fn main() -> Result<()> {
    color_eyre::install()?;

    // ---- EARLY INITIALISATION ----

    // Initialise session
    let session =
        Session::new("chain_exec", "sessions").wrap_err("Failed to create the session")?;

    // Initialise logger
    logger_init(LevelFilter::Debug, &session).wrap_err("Failed to initialise logging")?;

    // Log information on this execution.
    info!("Actuator Chain Control Executable\n");
    info!("Session directory: {:?}\n", session.session_root);

    // ---- LOAD PARAMETERS ----

    let exec_params: ChainExecParams =
        util::params::load("chain_exec.toml").wrap_err("Could not load exec params")?;
    exec_params
        .validate()
        .wrap_err("Invalid exec parameters")?;

    let net_params: NetParams =
        util::params::load("net.toml").wrap_err("Could not load net params")?;

    let chain_params = util::params::load::<ChainFileParams>(&exec_params.chain_params_file)
        .wrap_err("Could not load chain params")?
        .into_chain_params()
        .wrap_err("Invalid chain parameters")?;

    let chain_ctrl_params: chain_ctrl::Params =
        util::params::load(&exec_params.chain_ctrl_params_file)
            .wrap_err("Could not load ChainCtrl params")?;

    info!(
        "Parameters loaded, chain has {} joints: {:?}",
        chain_params.num_joints(),
        chain_params.joint_names()
    );

    // ---- INITIALISE ACTUATOR CHAIN ----

    let zmq_ctx = zmq::Context::new();

    let chain: Box<dyn ActuatorChain> = match exec_params.actuator {
        ActuatorKind::Sim => {
            info!("Using the simulated actuator chain");
            Box::new(SimChain::new())
        }
        ActuatorKind::Mech => {
            // Validated above
            let endpoint = exec_params.demands_endpoint.clone().unwrap_or_default();
            let c = MechChain::new(&zmq_ctx, &endpoint)
                .wrap_err("Failed to initialise the MechChain")?;
            info!("MechChain connected to {}", endpoint);
            Box::new(c)
        }
    };

    // ---- INITIALISE CONTROLLER ----

    let controller = Arc::new(
        ChainController::new(
            InitData {
                params: chain_ctrl_params,
                chain_params,
            },
            chain,
        )
        .wrap_err("Failed to initialise ChainCtrl")?,
    );
    info!("ChainCtrl init complete, the chain must be initialised with the Init TC");

    // ---- INITIALISE NETWORK ----

    info!("Initialising network");

    let shutdown = Arc::new(AtomicBool::new(false));
    {
        let shutdown = shutdown.clone();
        ctrlc::set_handler(move || shutdown.store(true, Ordering::Relaxed))
            .wrap_err("Failed to set the Ctrl-C handler")?;
    }

    let tc_server_handle = {
        let s = TcServer::new(&zmq_ctx, &net_params).wrap_err("Failed to initialise TcServer")?;
        info!("TcServer initialised");

        let controller = controller.clone();
        let shutdown = shutdown.clone();
        thread::spawn(move || s.run(controller, shutdown))
    };

    let mut tm_server = {
        let s = TmServer::new(&zmq_ctx, &net_params).wrap_err("Failed to initialise TmServer")?;
        info!("TmServer initialised");
        s
    };

    info!("Network initialisation complete");

    // ---- MAIN LOOP ----

    info!("Begining main loop\n");

    let cycle_period = seconds_to_std(exec_params.cycle_period_s);

    while !shutdown.load(Ordering::Relaxed) {
        // Get cycle start time
        let cycle_start_instant = Instant::now();

        // ---- CONTROL ALGORITHM PROCESSING ----

        let report = controller
            .tick(cycle_start_instant)
            .wrap_err("ChainCtrl processing failed")?;

        // ---- TELEMETRY ----

        if controller.is_initialised()? {
            let packet = TmPacket {
                elapsed_s: session::get_elapsed_seconds(),
                joint_state: controller.joint_state()?,
                controller_state: controller.controller_state()?,
                chain_ctrl_status_rpt: report,
            };

            if let Err(e) = tm_server.send(&packet) {
                warn!("TmServer error: {}", e);
            }
        }

        // ---- WRITE ARCHIVES ----

        for status in controller.drain_finished_goals()? {
            session.save(format!("goals/goal_{}.json", status.id), status);
        }

        // ---- CYCLE MANAGEMENT ----

        let cycle_dur = Instant::now() - cycle_start_instant;

        // Get sleep duration
        match cycle_period.checked_sub(cycle_dur) {
            Some(d) => thread::sleep(d),
            None => warn!(
                "Cycle overran by {:.06} s",
                cycle_dur.as_secs_f64() - cycle_period.as_secs_f64()
            ),
        }
    }

    // ---- SHUTDOWN ----

    info!("Shutdown requested");

    if controller.is_initialised()? {
        match controller.stop() {
            Ok(()) => info!("Actuator chain stopped"),
            Err(e) => error!("Could not stop the actuator chain: {}", e),
        }
    }

    if tc_server_handle.join().is_err() {
        warn!("TcServer thread panicked");
    }

    // Archive anything finished by the final stop
    for status in controller.drain_finished_goals()? {
        session.save(format!("goals/goal_{}.json", status.id), status);
    }

    info!("End of execution");

    session.exit();

    Ok(())
}
