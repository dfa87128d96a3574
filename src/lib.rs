//! Docker Compose development environments for `OroPlatform`
//! projects.
//!
//! `orodc` turns a project directory into a running local stack (web
//! server, PHP, database, search, message queue, cache, mail, SSH).
//! The interesting part is not the subcommands, which are thin
//! wrappers around `docker compose`, but the resolution core that
//! derives one consistent configuration from whatever the project
//! provides.
//!
//! # Resolution
//!
//! Every subcommand resolves an [`Environment`] first:
//!
//! 1. **Project** - name, root and config directory
//!    (`~/.orodc/<name>`), seeded with the compose templates on first
//!    use
//! 2. **Env files** - `.env`, `.env-app`, `.env-app.local`,
//!    `.env.orodc`, later files overriding earlier ones
//! 3. **Defaults** - connection fields for the database, search,
//!    message queue and cache, parsed from `ORO_DB_URL` and friends
//!    and completed from fixed defaults
//! 4. **Versions** - PHP and Node versions from the project's marker
//!    files
//! 5. **Compose files** - base files plus exactly one database
//!    specific override, last
//!
//! Nothing already set is ever overwritten, so resolving twice gives
//! the same result.
//!
//! # Example
//!
//! ```rust,no_run
//! use orodc::config::Entries;
//! use orodc::environment::{Environment, Settings};
//!
//! fn main() -> anyhow::Result<()> {
//!     let settings = Settings {
//!         project_dir: "/work/shop".into(),
//!         config_root: "/home/me/.orodc".into(),
//!         compose_source: Some("/usr/local/share/orodc/compose".into()),
//!         docker_bin: "docker".into(),
//!     };
//!     let env = Environment::resolve_with(settings, Entries::new(), "linux")?;
//!
//!     println!("{}", env.entries.get("ORO_DB_URL").unwrap_or_default());
//!     println!("docker {}", env.compose_args(&["up", "-d"]).join(" "));
//!     Ok(())
//! }
//! ```
//!
//! # Provisioning
//!
//! Shared resources are created with a check-then-create protocol
//! (see [`provision`]): the `dc_shared_net` network, the
//! `<name>_appcode` volume, an ed25519 SSH key and the application
//! database. Which failures abort is decided per subcommand by
//! [`provision::severity`].

// Allow noisy pedantic lints that don't add value for a
// command-line tool crate.
#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions
)]

pub mod cmd;
pub mod compose;
pub mod config;
pub mod defaults;
pub mod dsn;
pub mod dump;
pub mod env;
pub mod environment;
pub mod error;
pub mod pipeline;
pub mod ports;
pub mod project;
pub mod provision;
pub mod ssh;
pub mod status;
pub mod version;

pub use config::Entries;
pub use defaults::DatabaseSchema;
pub use environment::{Environment, Settings};
pub use pipeline::Pipeline;
pub use project::Project;
