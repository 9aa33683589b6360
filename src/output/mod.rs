mod progress;
mod styling;
mod summary;
mod tables;

pub use progress::{status_message, FlowProgress};
pub use styling::{cyan, dim, magenta_bold};
pub use summary::{render_creation_summary, CreationSummary};
pub use tables::{organizations_table, repositories_table};

/// Prints the `orgflow` banner to stderr.
///
/// Displays the tool name, version, and description at the start of execution.
pub fn print_banner() {
    eprintln!(
        r"
{} {}
  {}
",
        magenta_bold("🔧 orgflow"),
        dim(env!("CARGO_PKG_VERSION")),
        dim("Jenkins GitHub organization pipelines")
    );
}
