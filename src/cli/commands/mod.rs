//! One module per subcommand, each exposing `execute`.

pub mod delete;
pub mod get;
pub mod list;
pub mod rotate;
pub mod set;
