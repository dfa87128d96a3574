use std::io::Write;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use clap::{ArgAction, Parser, Subcommand};
use tracing::warn;

use crate::cmd::{self, Runner, System};
use crate::config::{self, Entries};
use crate::dump::{self, DumpFile};
use crate::environment::{Environment, Settings};
use crate::error::{OrodcError, OrodcResult};
use crate::ports;
use crate::project;
use crate::provision::Step;
use crate::ssh::{self, SshSession};
use crate::status;

/// Subcommand dispatcher over a resolved [`Environment`].
pub struct Pipeline {
    env: Environment,
    runner: Option<Box<dyn Runner>>,
}

impl Pipeline {
    #[must_use]
    pub const fn new(env: Environment) -> Self {
        Self { env, runner: None }
    }

    /// Route every external command through `runner` instead of
    /// spawning processes.
    #[must_use]
    pub fn with_runner(mut self, runner: impl Runner + 'static) -> Self {
        self.runner = Some(Box::new(runner));
        self
    }

    #[must_use]
    pub const fn env(&self) -> &Environment {
        &self.env
    }

    /// Run one subcommand. `find-free-port` does not need a project
    /// and is handled by [`run`].
    pub fn dispatch(&mut self, command: &Command) -> OrodcResult<()> {
        match command {
            Command::Up { args } => self.cmd_up(args),
            Command::Down { args } => self.cmd_down(args),
            Command::Install { without_demo } => self.cmd_install(*without_demo),
            Command::Console { args } => self.cmd_console(args),
            Command::Ssh { args } => self.cmd_ssh(args),
            Command::Status => self.cmd_status(),
            Command::ExportDb { path } => self.cmd_export_db(path.as_deref()),
            Command::ImportDb { path } => self.cmd_import_db(path),
            Command::CacheClear => self.cmd_cache_clear(),
            Command::PlatformUpdate => self.cmd_platform_update(),
            Command::Purge { yes } => self.cmd_purge(*yes),
            Command::Config { json, show_secrets } => {
                print!("{}", render_config(&self.env.entries, *json, *show_secrets)?);
                Ok(())
            }
            Command::FindFreePort { .. } => Err(OrodcError::InvalidArgument(
                "find-free-port does not run against a project".into(),
            )),
        }
    }

    fn with_runner_ref<T>(&self, f: impl FnOnce(&dyn Runner) -> T) -> T {
        match &self.runner {
            Some(runner) => f(runner.as_ref()),
            None => f(&self.env.runner()),
        }
    }

    fn provision(&mut self, required: &[Step]) -> OrodcResult<()> {
        let system = self.env.runner();
        let runner: &dyn Runner = match &self.runner {
            Some(runner) => runner.as_ref(),
            None => &system,
        };
        self.env.provision(runner, required)
    }

    fn compose_interactive<S: AsRef<str>>(&self, extra: &[S]) -> OrodcResult<()> {
        let args = self.env.compose_args(extra);
        let refs: Vec<&str> = args.iter().map(String::as_str).collect();
        self.with_runner_ref(|r| r.interactive(self.env.docker(), &refs))
    }

    fn compose_capture<S: AsRef<str>>(&self, extra: &[S]) -> OrodcResult<String> {
        let args = self.env.compose_args(extra);
        let refs: Vec<&str> = args.iter().map(String::as_str).collect();
        self.with_runner_ref(|r| r.capture(self.env.docker(), &refs))
    }

    /// `compose run --rm cli <args>`.
    fn cli<S: AsRef<str>>(&self, args: &[S]) -> OrodcResult<()> {
        let mut extra = vec!["run".to_string(), "--rm".to_string(), "cli".to_string()];
        extra.extend(args.iter().map(|a| a.as_ref().to_string()));
        self.compose_interactive(&extra)
    }

    fn ensure_database(&self) -> OrodcResult<()> {
        self.with_runner_ref(|r| self.env.ensure_database(r))?;
        Ok(())
    }

    fn cmd_up(&mut self, args: &[String]) -> OrodcResult<()> {
        self.provision(&[Step::Network, Step::Volume])?;

        let mut extra = vec!["up".to_string()];
        extra.extend(args.iter().cloned());
        self.compose_interactive(&extra)?;

        if args.iter().any(|a| a == "-d" || a == "--detach") {
            self.ensure_database()?;
        }
        Ok(())
    }

    fn cmd_down(&mut self, args: &[String]) -> OrodcResult<()> {
        self.provision(&[])?;
        eprintln!("Stopping containers for {}", self.env.project.name);
        let mut extra = vec!["down".to_string()];
        extra.extend(args.iter().cloned());
        self.compose_interactive(&extra)
    }

    fn cmd_install(&mut self, without_demo: bool) -> OrodcResult<()> {
        self.provision(&[Step::Network, Step::Volume])?;
        self.env.entries.set("XDEBUG_MODE", "off");

        if let Err(e) = self.compose_capture(&["down", "--remove-orphans", "-v"]) {
            warn!(error = %e, "failed to clean up orphans");
        }

        eprintln!("Starting database");
        self.compose_interactive(&["up", "-d", "database"])?;
        thread::sleep(Duration::from_secs(3));
        self.ensure_database()?;

        eprintln!("Clearing cache");
        self.cli(&["bash", "-c", CACHE_CLEAR_SCRIPT])?;

        eprintln!("Installing composer dependencies");
        self.cli(&["composer", "install"])?;

        self.add_hosts_entry();

        let application_url = format!("https://{}/", self.env.project.domain());
        let sample_data = if without_demo { "n" } else { "y" };
        let install = oro_install_args(&application_url, sample_data);
        self.cli(&install)?;

        eprintln!("Generating OAuth keys");
        if let Err(e) = self.cli(&[
            "php",
            "bin/console",
            "oro:oauth-server:generate-keys",
            "--env=prod",
        ]) {
            warn!(error = %e, "console key generation failed, falling back to openssl");
            if let Err(e) = self.cli(&["bash", "-c", OAUTH_KEYS_SCRIPT]) {
                warn!(error = %e, "OAuth key generation failed");
            }
        }

        eprintln!();
        eprintln!("Installation complete: {application_url}");
        Ok(())
    }

    /// Advisory: a missing hosts entry only affects the pretty URL.
    fn add_hosts_entry(&self) {
        let domain = self.env.project.domain();
        let script = format!(
            "grep -q '{domain}' /etc/hosts || echo '127.0.0.1 {domain}' | sudo tee -a /etc/hosts"
        );
        if let Err(e) = self.with_runner_ref(|r| r.interactive("bash", &["-c", &script])) {
            warn!(%domain, error = %e, "failed to add hosts entry");
        }
    }

    fn cmd_console(&mut self, args: &[String]) -> OrodcResult<()> {
        self.provision(&[])?;
        let mut extra = vec!["php".to_string(), "bin/console".to_string()];
        extra.extend(args.iter().cloned());
        self.cli(&extra)
    }

    fn cmd_ssh(&mut self, args: &[String]) -> OrodcResult<()> {
        self.provision(&[Step::SshKey])?;

        let output = self.compose_capture(&["port", "ssh", "22"])?;
        let port = ssh::parse_published_port(&output)?;
        eprintln!("Connecting to SSH on port {port}");

        let session =
            SshSession::for_project(&self.env.entries, port, &self.env.project.ssh_key_path());
        self.with_runner_ref(|r| session.connect(r, args))
    }

    fn cmd_status(&self) -> OrodcResult<()> {
        let project = &self.env.project;
        println!("Project:   {}", project.name);
        println!("Directory: {}", project.root.display());
        println!();

        let filter = format!("name={}_", project.name);
        let output = self.with_runner_ref(|r| {
            r.capture(
                self.env.docker(),
                &["ps", "-a", "--format", "json", "--filter", &filter],
            )
        })?;
        let containers = status::parse_containers(&output);

        if containers.is_empty() {
            println!("No containers found for project '{}'", project.name);
            println!("Try `orodc up -d` to start the project");
            return Ok(());
        }

        println!(
            "{:<16} {:<10} {:<14} {:<10} IMAGE",
            "SERVICE", "STATE", "PORTS", "HEALTH"
        );
        for c in &containers {
            println!(
                "{:<16} {:<10} {:<14} {:<10} {}",
                c.service(),
                c.state,
                c.host_ports(),
                c.health(),
                c.short_image()
            );
        }

        let urls = status::service_urls(
            &self.env.entries,
            &project.domain(),
            self.env.services.schema,
        );
        if !urls.is_empty() {
            println!();
            for (label, url) in urls {
                println!("  {label:<12} {url}");
            }
        }

        println!();
        println!(
            "Compose: {} {}",
            self.env.docker(),
            self.env.compose_args::<&str>(&[]).join(" ")
        );
        Ok(())
    }

    fn cmd_export_db(&mut self, path: Option<&Path>) -> OrodcResult<()> {
        self.provision(&[])?;
        let path = path.map_or_else(
            || PathBuf::from(dump::default_file_name(chrono::Local::now())),
            Path::to_path_buf,
        );
        let file = DumpFile::new(&path)?;
        std::fs::create_dir_all(&file.dir)?;

        let script = dump::export_script(
            self.env.services.schema,
            &self.env.services.database,
            &file,
        );
        eprintln!("Exporting database to {}", file.dir.join(&file.name).display());
        self.compose_interactive(&[
            "run",
            "--rm",
            "-v",
            file.volume().as_str(),
            "cli",
            "bash",
            "-c",
            script.as_str(),
        ])
    }

    fn cmd_import_db(&mut self, path: &Path) -> OrodcResult<()> {
        if !path.is_file() {
            return Err(OrodcError::FileNotFound(path.display().to_string()));
        }
        self.provision(&[])?;
        let file = DumpFile::new(path)?;
        let script = dump::import_script(
            self.env.services.schema,
            &self.env.services.database,
            &file,
        );
        eprintln!("Importing {} into {}", path.display(), self.env.services.schema);
        self.compose_interactive(&[
            "run",
            "--rm",
            "-v",
            file.volume().as_str(),
            "cli",
            "bash",
            "-c",
            script.as_str(),
        ])
    }

    fn cmd_cache_clear(&mut self) -> OrodcResult<()> {
        self.provision(&[])?;
        eprintln!("Clearing cache");
        self.cli(&["bash", "-c", CACHE_CLEAR_SCRIPT])
    }

    fn cmd_platform_update(&mut self) -> OrodcResult<()> {
        self.provision(&[])?;
        eprintln!("Running oro:platform:update");
        self.cli(&["php", "bin/console", "oro:platform:update", "--env=prod"])
    }

    fn cmd_purge(&self, yes: bool) -> OrodcResult<()> {
        let project = &self.env.project;
        eprintln!(
            "WARNING: This will remove all containers and volumes of '{}'",
            project.name
        );
        eprintln!("and delete {}", project.config_dir.display());
        eprintln!();

        if !yes {
            eprint!("Are you sure? Type 'yes' to confirm: ");
            std::io::stderr().flush()?;
            let mut input = String::new();
            std::io::stdin().read_line(&mut input)?;
            if input.trim() != "yes" {
                eprintln!("Aborted.");
                return Ok(());
            }
        }

        if let Err(e) = self.compose_interactive(&["down", "-v"]) {
            warn!(error = %e, "compose down failed");
        }

        let volume = project.appcode_volume();
        if let Err(e) = self.with_runner_ref(|r| {
            r.capture(self.env.docker(), &["volume", "rm", "-f", &volume])
        }) {
            warn!(%volume, error = %e, "failed to remove volume");
        }

        if project.config_dir.is_dir() {
            std::fs::remove_dir_all(&project.config_dir)?;
            eprintln!("Removed config directory {}", project.config_dir.display());
        }

        eprintln!();
        eprintln!("Purge complete!");
        Ok(())
    }
}

const CACHE_CLEAR_SCRIPT: &str =
    "[[ -d ${DC_ORO_APPDIR}/var/cache ]] && rm -rf ${DC_ORO_APPDIR}/var/cache/* || true";

const OAUTH_KEYS_SCRIPT: &str = "mkdir -p var/oauth && cd var/oauth && \
if [ ! -f private.key ]; then \
openssl genpkey -algorithm RSA -out private.key -pkcs8 -pass pass: && \
openssl rsa -in private.key -pubout -out public.key && \
chmod 600 private.key && chmod 644 public.key; \
fi";

fn oro_install_args(application_url: &str, sample_data: &str) -> Vec<String> {
    [
        "php",
        "bin/console",
        "--env=prod",
        "--timeout=1800",
        "oro:install",
        "--language=en",
        "--formatting-code=en_US",
        "--organization-name=Acme Inc.",
        "--user-name=admin",
        "--user-email=admin@example.com",
        "--user-firstname=John",
        "--user-lastname=Doe",
        "--user-password=$ecretPassw0rd",
    ]
    .into_iter()
    .map(String::from)
    .chain([
        format!("--application-url={application_url}"),
        format!("--sample-data={sample_data}"),
    ])
    .collect()
}

/// Resolved entries as `KEY=VALUE` lines or a JSON object. Secrets
/// are masked unless `show_secrets` is set.
pub fn render_config(entries: &Entries, json: bool, show_secrets: bool) -> OrodcResult<String> {
    let visible = entries.iter().map(|(k, v)| {
        let value = if !show_secrets && config::is_secret(k) && !v.is_empty() {
            "********"
        } else {
            v
        };
        (k, value)
    });

    if json {
        let map: serde_json::Map<String, serde_json::Value> = visible
            .map(|(k, v)| (k.to_string(), serde_json::Value::from(v)))
            .collect();
        let mut out = serde_json::to_string_pretty(&map)?;
        out.push('\n');
        Ok(out)
    } else {
        Ok(visible.map(|(k, v)| format!("{k}={v}\n")).collect())
    }
}

/// `find-free-port`: print the first usable host port for `service`.
pub fn find_free_port(
    runner: &dyn Runner,
    docker: &str,
    project: &str,
    service: &str,
    start: u16,
    compose_dir: &Path,
) -> OrodcResult<u16> {
    let mut used = ports::compose_used_ports(compose_dir, service);
    match ports::docker_used_ports(runner, docker, project, service) {
        Ok(taken) => used.extend(taken),
        Err(e) => warn!(error = %e, "cannot list container ports"),
    }

    ports::find_free_port(start, &used, ports::is_bindable).ok_or_else(|| {
        OrodcError::Other(format!("could not find a free port from {start}"))
    })
}

/// Run a parsed command line.
pub fn run(cli: &Cli) -> OrodcResult<()> {
    if let Command::FindFreePort {
        project,
        service,
        start_port,
        compose_dir,
    } = &cli.command
    {
        let port = find_free_port(
            &System::new(),
            &cli.docker_bin,
            project,
            service,
            *start_port,
            compose_dir,
        )?;
        println!("{port}");
        return Ok(());
    }

    if !matches!(cli.command, Command::Config { .. }) && !cmd::command_exists(&cli.docker_bin) {
        return Err(OrodcError::PrerequisiteMissing(format!(
            "{} not found on PATH",
            cli.docker_bin
        )));
    }

    let env = Environment::resolve(cli.settings()?)?;
    Pipeline::new(env).dispatch(&cli.command)
}

#[derive(Parser, Debug)]
#[command(name = "orodc", version)]
#[command(about = "Docker Compose development environments for OroPlatform projects")]
pub struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Project directory (defaults to the current directory)
    #[arg(long, global = true, value_name = "DIR")]
    pub project_dir: Option<PathBuf>,

    /// Docker executable
    #[arg(long, global = true, env = "DOCKER_BIN", default_value = "docker")]
    pub docker_bin: String,

    /// Root of the per-project config directories (defaults to ~/.orodc)
    #[arg(long, global = true, env = "ORODC_HOME", value_name = "DIR")]
    pub config_root: Option<PathBuf>,

    /// Directory holding the compose templates copied on first use
    #[arg(long, global = true, env = "ORODC_COMPOSE_SOURCE", value_name = "DIR")]
    pub compose_source: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// Tool settings with defaults applied.
    pub fn settings(&self) -> OrodcResult<Settings> {
        let project_dir = match &self.project_dir {
            Some(dir) => dir.clone(),
            None => std::env::current_dir()?,
        };
        let config_root = match &self.config_root {
            Some(dir) => dir.clone(),
            None => project::default_config_root()?,
        };
        Ok(Settings {
            project_dir,
            config_root,
            compose_source: self
                .compose_source
                .clone()
                .or_else(project::default_compose_source),
            docker_bin: self.docker_bin.clone(),
        })
    }
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Start the environment (docker compose up)
    Up {
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },

    /// Stop the environment (docker compose down)
    Down {
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },

    /// Install the application from scratch
    Install {
        /// Install without demo data
        #[arg(long)]
        without_demo: bool,
    },

    /// Run bin/console inside the cli container
    Console {
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },

    /// Connect to the ssh container
    Ssh {
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },

    /// Show containers and service URLs of the project
    Status,

    /// Export a gzip-compressed database dump
    ExportDb {
        /// Output file (defaults to dump-<timestamp>.sql.gz)
        path: Option<PathBuf>,
    },

    /// Import a database dump (.sql or .sql.gz)
    ImportDb { path: PathBuf },

    /// Clear the application cache
    CacheClear,

    /// Run oro:platform:update
    PlatformUpdate,

    /// Remove containers, volumes and the config directory
    Purge {
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },

    /// Find an available host port for a compose service
    FindFreePort {
        project: String,
        service: String,
        start_port: u16,
        compose_dir: PathBuf,
    },

    /// Print the resolved configuration
    Config {
        /// Print as a JSON object
        #[arg(long)]
        json: bool,

        /// Do not mask passwords
        #[arg(long)]
        show_secrets: bool,
    },
}
