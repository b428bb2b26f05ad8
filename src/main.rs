use std::sync::Arc;

use smb_reader::server::config::FileConfig;
use smb_reader::share::http::{HttpFileEntry, HttpShare};
use smb_reader::util::auth::User;
use smb_reader::ServerBuilder;

/// Installs the crash policy: an uncaught defect inside a handler must be
/// fatal to the process rather than silently isolated to one connection's
/// task (tokio's default panic behaviour).
fn install_crash_policy() {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        default_hook(info);
        #[cfg(feature = "tracing")]
        tracing::error!(%info, "fatal: uncaught panic inside a connection handler, terminating");
        std::process::exit(1);
    }));
}

#[cfg(feature = "tracing")]
fn init_logging() {
    use tracing_subscriber::EnvFilter;
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
}

#[cfg(not(feature = "tracing"))]
fn init_logging() {}

fn config_path_from_args() -> Option<String> {
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        if arg == "--config" {
            return args.next();
        }
    }
    None
}

fn build_server() -> anyhow::Result<smb_reader::SMBServer> {
    let mut builder = ServerBuilder::default();

    if let Ok(bind) = std::env::var("SMB_BIND") {
        builder = builder.bind_address(bind);
    }
    if let Ok(port) = std::env::var("SMB_PORT") {
        builder = builder.port(port.parse()?);
    }
    if std::env::var("SMB_ANONYMOUS").as_deref() == Ok("true") {
        builder = builder.anonymous_access(true);
    }
    if let (Ok(user), Ok(password)) = (std::env::var("SMB_USER"), std::env::var("SMB_PASSWORD")) {
        builder = builder.add_user(User::new(user, password));
    }

    if let Some(path) = config_path_from_args() {
        let contents = std::fs::read_to_string(&path)?;
        let file_config = FileConfig::from_toml_str(&contents)?;
        if let Some(bind) = file_config.bind {
            builder = builder.bind_address(bind);
        }
        if let Some(port) = file_config.port {
            builder = builder.port(port);
        }
        for share in file_config.shares {
            match share {
                smb_reader::server::config::ShareConfig::Http { name, entries, headers, .. } => {
                    let entries = entries
                        .into_iter()
                        .map(|e| HttpFileEntry {
                            name: e.name,
                            url: e.url,
                            size: e.size,
                            last_modified_ms: e.last_modified_ms,
                        })
                        .collect();
                    let share: Arc<dyn smb_reader::share::Share> =
                        Arc::new(HttpShare::new(name.clone(), entries, headers));
                    builder = builder.add_share(name, share);
                }
            }
        }
    }

    Ok(builder.build())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    install_crash_policy();
    init_logging();

    let server = build_server()?;
    smb_reader::server::run(server).await
}
