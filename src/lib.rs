//! rinkrl: command-line front end for a DQN ice-hockey agent
//!
//! The crate routes the `train`, `evaluate`, `compare`, and `visualize`
//! subcommands to their pipelines and resolves which compute device a
//! pipeline runs on (CPU, CUDA, or Apple-Silicon Metal).

pub mod cli;
pub mod config;
pub mod device;
pub mod exitcode;
pub mod pipeline;
pub mod util;
