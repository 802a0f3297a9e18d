use std::path::PathBuf;

use clap::{value_parser, ArgAction, Args, Parser, Subcommand};
use netmig_core::{
    MigrateRequest, MigrationMode, RepoSource, DEFAULT_BRANCH, DEFAULT_OUTPUT_DIR,
    DEFAULT_TARGET_FRAMEWORK, NUGET_PUBLIC_URL,
};

pub const NETMIG_HELP_TEMPLATE: &str =
    "{before-help}\nUsage:\n    {usage}\n\nGlobal options:\n{options}\n";

pub const NETMIG_BEFORE_HELP: &str = concat!(
    "netmig ",
    env!("CARGO_PKG_VERSION"),
    " – Retarget .NET repositories and report package compatibility\n\n",
    "\x1b[1;36mCommands\x1b[0m\n",
    "  analyze          Scan a repository and report what a migration would change.\n",
    "  migrate          Rewrite frameworks and packages, verify the build, report.\n",
);

#[derive(Parser, Debug)]
#[command(
    name = "netmig",
    author,
    version,
    propagate_version = false,
    disable_help_subcommand = true,
    before_help = NETMIG_BEFORE_HELP,
    help_template = NETMIG_HELP_TEMPLATE
)]
pub struct NetmigCli {
    #[arg(
        short,
        long,
        help = "Suppress human output (errors still print to stderr)",
        global = true
    )]
    pub quiet: bool,
    #[arg(
        short,
        long,
        action = ArgAction::Count,
        help = "Increase logging (-vv reaches trace); -v also keeps full tool output",
        global = true
    )]
    pub verbose: u8,
    #[arg(long, help = "Force trace logging regardless of -v/-q", global = true)]
    pub trace: bool,
    #[arg(
        long,
        help = "Emit {status,message,details} JSON envelopes",
        global = true
    )]
    pub json: bool,
    #[arg(long, help = "Disable colored human output", global = true)]
    pub no_color: bool,
    #[command(subcommand)]
    pub command: CommandCli,
}

#[derive(Subcommand, Debug)]
pub enum CommandCli {
    #[command(
        about = "Scan, resolve and report; never writes project files.",
        override_usage = "netmig analyze (--repo URL | --path DIR) [OPTIONS]",
        after_help = "Examples:\n  netmig analyze --repo https://dev.example.com/org/app.git --branch main\n  netmig analyze --path . --output ./report"
    )]
    Analyze(RepoArgs),
    #[command(
        about = "Retarget frameworks, update packages, verify the build and report.",
        override_usage = "netmig migrate (--repo URL | --path DIR) [OPTIONS]",
        after_help = "Examples:\n  netmig migrate --repo https://dev.example.com/org/app.git --private-source https://feed.example/nuget\n  netmig migrate --path . --list-packages --upgrade-assistant"
    )]
    Migrate(MigrateArgs),
}

#[derive(Args, Debug, Clone)]
pub struct RepoArgs {
    #[arg(
        long,
        value_name = "URL",
        conflicts_with = "path",
        required_unless_present = "path",
        help = "Repository to clone (https, ssh, git@host:path or file://)"
    )]
    pub repo: Option<String>,
    #[arg(
        long,
        value_name = "DIR",
        value_parser = value_parser!(PathBuf),
        help = "Use an existing checkout in place instead of cloning"
    )]
    pub path: Option<PathBuf>,
    #[arg(long, default_value = DEFAULT_BRANCH, help = "Branch to clone")]
    pub branch: String,
    #[arg(
        long,
        value_name = "DIR",
        value_parser = value_parser!(PathBuf),
        default_value = DEFAULT_OUTPUT_DIR,
        help = "Directory the report files are written to"
    )]
    pub output: PathBuf,
    #[arg(
        long,
        env = "NETMIG_PAT",
        hide_env_values = true,
        help = "Personal access token for cloning over http(s)"
    )]
    pub pat: Option<String>,
    #[arg(
        long = "private-source",
        value_name = "URL",
        env = "NETMIG_PRIVATE_SOURCE",
        value_delimiter = ',',
        action = ArgAction::Append,
        help = "Private NuGet feed base URL (repeatable, probed in order)"
    )]
    pub private_sources: Vec<String>,
    #[arg(long, env = "NETMIG_PRIVATE_USERNAME", help = "Username for private feeds")]
    pub private_username: Option<String>,
    #[arg(
        long,
        env = "NETMIG_PRIVATE_PASSWORD",
        hide_env_values = true,
        help = "Password or token for private feeds"
    )]
    pub private_password: Option<String>,
    #[arg(
        long,
        env = "NETMIG_TARGET_FRAMEWORK",
        default_value = DEFAULT_TARGET_FRAMEWORK,
        help = "Framework moniker to migrate to"
    )]
    pub target_framework: String,
    #[arg(
        long,
        env = "NETMIG_NUGET_URL",
        default_value = NUGET_PUBLIC_URL,
        help = "Public NuGet registry base URL"
    )]
    pub nuget_url: String,
    #[arg(
        long = "internal-prefix",
        value_name = "PREFIX",
        action = ArgAction::Append,
        help = "Package id prefix only resolved against private feeds (default Internal.)"
    )]
    pub internal_prefixes: Vec<String>,
}

#[derive(Args, Debug, Clone)]
pub struct MigrateArgs {
    #[command(flatten)]
    pub repo: RepoArgs,
    #[arg(long, help = "Attach `dotnet list package --include-transitive` output")]
    pub list_packages: bool,
    #[arg(
        long,
        help = "Install upgrade-assistant if needed and analyze .NET Framework projects"
    )]
    pub upgrade_assistant: bool,
}

impl RepoArgs {
    pub fn to_request(&self, mode: MigrationMode) -> MigrateRequest {
        let source = match (&self.repo, &self.path) {
            (_, Some(path)) => RepoSource::Local(path.clone()),
            (Some(url), None) => RepoSource::Remote(url.clone()),
            (None, None) => RepoSource::Local(PathBuf::from(".")),
        };
        let mut request = MigrateRequest::new(mode, source);
        request.branch.clone_from(&self.branch);
        request.output.clone_from(&self.output);
        request.token.clone_from(&self.pat);
        request.private_sources = self
            .private_sources
            .iter()
            .map(|url| url.trim().to_string())
            .filter(|url| !url.is_empty())
            .collect();
        request.private_username.clone_from(&self.private_username);
        request.private_password.clone_from(&self.private_password);
        request.target_framework.clone_from(&self.target_framework);
        request.nuget_url.clone_from(&self.nuget_url);
        request.internal_prefixes.clone_from(&self.internal_prefixes);
        request
    }
}

impl CommandCli {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Analyze(_) => "analyze",
            Self::Migrate(_) => "migrate",
        }
    }

    pub fn to_request(&self) -> MigrateRequest {
        match self {
            Self::Analyze(args) => args.to_request(MigrationMode::Analyze),
            Self::Migrate(args) => {
                let mut request = args.repo.to_request(MigrationMode::Apply);
                request.list_packages = args.list_packages;
                request.upgrade_assistant = args.upgrade_assistant;
                request
            }
        }
    }
}
