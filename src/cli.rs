use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "taskforge", about = "Task tracker with skill-matched developers")]
pub struct Cli {
    /// Path to the SQLite database [default: ~/.taskforge/taskforge.db]
    #[arg(long, env = "TASKFORGE_DB", global = true)]
    pub db: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Create database and tables (idempotent)
    Init,

    /// Load the standard skills and sample developers
    Seed,

    /// Run the HTTP API
    Serve(ServeArgs),

    /// Print root tasks with two levels of subtasks
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print developers with their skills
    Developers {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show one task
    Show {
        /// Task id
        id: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Args, Debug, Clone)]
pub struct ServeArgs {
    /// Address to bind
    #[arg(long, env = "TASKFORGE_HOST", default_value = "127.0.0.1")]
    pub host: String,

    /// Port to listen on
    #[arg(long, env = "PORT", default_value_t = 5001)]
    pub port: u16,

    /// Directory with the built browser client, served at /
    #[arg(long, env = "TASKFORGE_STATIC_DIR")]
    pub static_dir: Option<String>,

    /// Gemini API key used to infer task skills
    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true)]
    pub gemini_api_key: Option<String>,

    /// Gemini model name
    #[arg(long, env = "GEMINI_MODEL", default_value = taskforge::infer::DEFAULT_MODEL)]
    pub gemini_model: String,

    /// Timeout for one inference call, in seconds
    #[arg(long, default_value_t = 15)]
    pub inference_timeout: u64,

    /// Skip the model and give every task without skills these names
    #[arg(long, value_delimiter = ',')]
    pub offline_skills: Option<Vec<String>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn serve_defaults() {
        let cli = Cli::try_parse_from(["taskforge", "serve"]).unwrap();
        let Command::Serve(args) = cli.command else {
            panic!("expected serve");
        };
        assert_eq!(args.gemini_model, taskforge::infer::DEFAULT_MODEL);
        assert_eq!(args.inference_timeout, 15);
        assert!(args.offline_skills.is_none());
    }

    #[test]
    fn offline_skills_split_on_commas() {
        let cli = Cli::try_parse_from(["taskforge", "serve", "--offline-skills", "Frontend,Backend"])
            .unwrap();
        let Command::Serve(args) = cli.command else {
            panic!("expected serve");
        };
        assert_eq!(
            args.offline_skills,
            Some(vec!["Frontend".to_string(), "Backend".to_string()])
        );
    }
}
