//! # Console commands
//!
//! Parses one line of operator input into a [`Cmd`], and converts commands into telecommands.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::{
    fs,
    path::{Path, PathBuf},
};
use structopt::{clap::AppSettings, StructOpt};

use comms_if::tc::{
    chain_ctrl::{GoalId, OperationMode, Trajectory, VelocityCmd},
    Tc,
};

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// A command entered at the console prompt.
#[derive(Debug, Clone, PartialEq, StructOpt)]
#[structopt(
    name = "chain",
    no_version,
    global_settings = &[AppSettings::VersionlessSubcommands]
)]
pub enum Cmd {
    /// Initialise the actuator chain
    Init,

    /// Stop the chain and abort the executing goal
    Stop,

    /// Clear a latched fault
    Recover,

    /// Set the operation mode, "position" or "velocity"
    Mode { mode: OperationMode },

    /// Submit the trajectory in the given JSON file and wait for it to finish
    Goal {
        #[structopt(parse(from_os_str))]
        file: PathBuf,

        /// Return as soon as the goal is accepted
        #[structopt(long)]
        no_wait: bool,
    },

    /// Command joint velocities, one value per joint in radians/second
    #[structopt(setting = AppSettings::AllowNegativeNumbers)]
    Vel {
        #[structopt(required = true)]
        velocities: Vec<f64>,
    },

    /// Get the status of a goal
    Status { goal_id: GoalId },

    /// Cancel the executing goal
    Cancel { goal_id: Option<GoalId> },

    /// Exit the console
    Exit,
}

#[derive(Debug, thiserror::Error)]
pub enum CmdError {
    #[error("{0}")]
    Parse(structopt::clap::Error),

    #[error("Could not read the trajectory file: {0}")]
    TrajFileError(std::io::Error),

    #[error("The trajectory file is not a valid trajectory: {0}")]
    TrajParseError(serde_json::Error),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Cmd {
    /// Parse a line of console input.
    ///
    /// Returns `Ok(None)` for a blank line.
    pub fn parse_line(line: &str) -> Result<Option<Self>, CmdError> {
        let words: Vec<&str> = line.split_whitespace().collect();
        if words.is_empty() {
            return Ok(None);
        }

        Self::from_iter_safe(std::iter::once("chain").chain(words))
            .map(Some)
            .map_err(CmdError::Parse)
    }

    /// Build the telecommand for this command.
    ///
    /// Returns `Ok(None)` for commands handled by the console itself.
    pub fn to_tc(&self) -> Result<Option<Tc>, CmdError> {
        let tc = match self {
            Cmd::Init => Tc::Init,
            Cmd::Stop => Tc::Stop,
            Cmd::Recover => Tc::Recover,
            Cmd::Mode { mode } => Tc::SetOperationMode { mode: *mode },
            Cmd::Goal { file, .. } => Tc::SubmitGoal(load_trajectory(file)?),
            Cmd::Vel { velocities } => Tc::DirectCommand(VelocityCmd {
                velocities: velocities.clone(),
            }),
            Cmd::Status { goal_id } => Tc::GoalStatus { goal_id: *goal_id },
            Cmd::Cancel { goal_id } => Tc::CancelGoal { goal_id: *goal_id },
            Cmd::Exit => return Ok(None),
        };

        Ok(Some(tc))
    }
}

// ------------------------------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Load a trajectory from a JSON file.
pub fn load_trajectory(path: &Path) -> Result<Trajectory, CmdError> {
    let traj_str = fs::read_to_string(path).map_err(CmdError::TrajFileError)?;

    serde_json::from_str(&traj_str).map_err(CmdError::TrajParseError)
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_line() {
        assert_eq!(Cmd::parse_line("   ").unwrap(), None);
        assert_eq!(Cmd::parse_line("init").unwrap(), Some(Cmd::Init));
        assert_eq!(
            Cmd::parse_line("mode velocity").unwrap(),
            Some(Cmd::Mode {
                mode: OperationMode::Velocity
            })
        );
        assert_eq!(
            Cmd::parse_line("goal traj.json --no-wait").unwrap(),
            Some(Cmd::Goal {
                file: PathBuf::from("traj.json"),
                no_wait: true
            })
        );
        assert_eq!(
            Cmd::parse_line("vel 0.1 -0.2").unwrap(),
            Some(Cmd::Vel {
                velocities: vec![0.1, -0.2]
            })
        );
        assert_eq!(
            Cmd::parse_line("cancel").unwrap(),
            Some(Cmd::Cancel { goal_id: None })
        );
        assert_eq!(
            Cmd::parse_line("cancel 4").unwrap(),
            Some(Cmd::Cancel { goal_id: Some(4) })
        );

        assert!(Cmd::parse_line("mode torque").is_err());
        assert!(Cmd::parse_line("vel").is_err());
        assert!(Cmd::parse_line("status").is_err());
        assert!(Cmd::parse_line("fly").is_err());
    }

    #[test]
    fn test_to_tc() {
        assert_eq!(Cmd::Exit.to_tc().unwrap(), None);
        assert_eq!(
            Cmd::Status { goal_id: 3 }.to_tc().unwrap(),
            Some(Tc::GoalStatus { goal_id: 3 })
        );

        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"points": [{{"positions": [0.1, 0.2]}}, {{"positions": [0.3, 0.4]}}]}}"#
        )
        .unwrap();

        let cmd = Cmd::Goal {
            file: file.path().to_path_buf(),
            no_wait: false,
        };
        assert_eq!(
            cmd.to_tc().unwrap(),
            Some(Tc::SubmitGoal(Trajectory::from_positions(vec![
                vec![0.1, 0.2],
                vec![0.3, 0.4]
            ])))
        );

        let missing = Cmd::Goal {
            file: PathBuf::from("/nonexistent/traj.json"),
            no_wait: false,
        };
        assert!(matches!(missing.to_tc(), Err(CmdError::TrajFileError(_))));
    }
}
