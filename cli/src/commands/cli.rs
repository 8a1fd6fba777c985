use clap::{Args as ClapArgs, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "redline",
    about = "Submit document review jobs and watch them complete",
    version
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Analyze one document section and print the feedback payload
    Analyze(AnalyzeArgs),
    /// Ask a question about the document under review
    Chat(ChatArgs),
    /// Print the dispatch and throttle health snapshot
    Stats,
}

#[derive(ClapArgs, Debug)]
pub struct AnalyzeArgs {
    /// Section name, e.g. "Background"
    #[arg(long)]
    pub section: String,

    /// File holding the section text; reads stdin when omitted
    #[arg(long)]
    pub file: Option<String>,

    /// Document type label
    #[arg(long, default_value = "Full Write-up")]
    pub doc_type: String,

    /// Poll interval in milliseconds while waiting for the task
    #[arg(long, default_value_t = 500)]
    pub poll_ms: u64,
}

#[derive(ClapArgs, Debug)]
pub struct ChatArgs {
    /// The question to ask
    pub query: String,

    /// Optional JSON file with document context
    #[arg(long)]
    pub context_file: Option<String>,

    /// Poll interval in milliseconds while waiting for the task
    #[arg(long, default_value_t = 500)]
    pub poll_ms: u64,
}
