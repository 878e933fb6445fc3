//! CLI configuration and argument parsing.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const COMMIT: &str = env!("BUILD_COMMIT");
pub const BUILD_DATE: &str = env!("BUILD_DATE");

/// EKS kubeconfig generator.
///
/// Renders kubeconfig files that authenticate with `aws eks get-token`, either
/// directly or as a CloudFormation custom resource handler, and resolves EKS
/// cluster blueprints.
#[derive(Parser, Debug, Clone)]
#[command(name = "ekcfg")]
#[command(about = "EKS kubeconfig generator")]
#[command(version = const_format::formatcp!(
    "{} (commit: {}, build date: {})",
    VERSION, COMMIT, BUILD_DATE
))]
pub struct Args {
    /// AWS region
    #[arg(short, long, global = true, env = "AWS_REGION")]
    pub region: Option<String>,

    /// AWS profile to use
    #[arg(short, long, global = true, env = "AWS_PROFILE")]
    pub profile: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "warn", env = "EKCFG_LOG_LEVEL")]
    pub log_level: String,

    /// Log format: json or pretty
    #[arg(long, global = true, default_value = "pretty", env = "EKCFG_LOG_FORMAT")]
    pub log_format: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Render a kubeconfig from explicit cluster attributes
    Render {
        /// Cluster name
        #[arg(long)]
        name: String,

        /// API server endpoint
        #[arg(long)]
        endpoint: String,

        /// Base64-encoded certificate authority data
        #[arg(long)]
        ca_data: String,

        /// Cluster ARN (region is taken from its 4th field)
        #[arg(long)]
        arn: Option<String>,
    },

    /// Describe an EKS cluster and render its kubeconfig
    Generate {
        /// Cluster name
        #[arg(short, long)]
        cluster: String,

        /// Write the kubeconfig to this path instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Process a CloudFormation custom resource event and print the response
    Handle {
        /// Event JSON file ("-" reads stdin)
        #[arg(short, long, default_value = "-")]
        event: String,

        /// Also write the kubeconfig to this path
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Lambda function name; enables writing to /tmp/kubeconfig
        #[arg(long, env = "AWS_LAMBDA_FUNCTION_NAME", hide = true)]
        lambda_function: Option<String>,
    },

    /// Resolve a cluster blueprint and print the full plan
    Blueprint {
        /// Blueprint YAML file
        #[arg(short, long)]
        file: PathBuf,

        /// Output format
        #[arg(long, value_enum, default_value_t = OutputFormat::Yaml)]
        format: OutputFormat,
    },
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Yaml,
    Json,
}

impl Command {
    /// Whether the command needs AWS credentials.
    pub fn needs_aws(&self) -> bool {
        matches!(self, Self::Generate { .. } | Self::Handle { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verify_cli() {
        use clap::CommandFactory;
        Args::command().debug_assert();
    }

    #[test]
    fn test_parse_render() {
        let args = Args::try_parse_from([
            "ekcfg",
            "render",
            "--name",
            "demo",
            "--endpoint",
            "https://demo.eks.amazonaws.com",
            "--ca-data",
            "BASE64DATA",
        ])
        .unwrap();

        match args.command {
            Command::Render { name, arn, .. } => {
                assert_eq!(name, "demo");
                assert!(arn.is_none());
            }
            other => panic!("unexpected command: {other:?}"),
        }
        assert!(!Command::Render {
            name: String::new(),
            endpoint: String::new(),
            ca_data: String::new(),
            arn: None,
        }
        .needs_aws());
    }

    #[test]
    fn test_parse_generate_with_global_flags() {
        let args = Args::try_parse_from([
            "ekcfg",
            "generate",
            "--cluster",
            "demo",
            "--region",
            "eu-west-1",
            "--log-level",
            "debug",
        ])
        .unwrap();

        assert_eq!(args.region.as_deref(), Some("eu-west-1"));
        assert_eq!(args.log_level, "debug");
        assert!(args.command.needs_aws());
    }

    #[test]
    fn test_parse_handle_defaults_to_stdin() {
        let args = Args::try_parse_from(["ekcfg", "handle"]).unwrap();
        match args.command {
            Command::Handle { event, output, .. } => {
                assert_eq!(event, "-");
                assert!(output.is_none());
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_parse_blueprint_format() {
        let args =
            Args::try_parse_from(["ekcfg", "blueprint", "--file", "bp.yaml", "--format", "json"])
                .unwrap();
        match args.command {
            Command::Blueprint { file, format } => {
                assert_eq!(file, PathBuf::from("bp.yaml"));
                assert_eq!(format, OutputFormat::Json);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_render_requires_endpoint() {
        assert!(Args::try_parse_from(["ekcfg", "render", "--name", "demo", "--ca-data", "x"]).is_err());
    }
}
