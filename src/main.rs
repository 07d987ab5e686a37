use anyhow::Result;
use hostagent::agent::{Agent, AgentDeps};
use hostagent::docker_repo::{ContainerStatsSource, DockerRepo};
use hostagent::gpu::{GpuManager, TokioCommandRunner};
use hostagent::*;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<()> {
    if std::env::args()
        .skip(1)
        .any(|a| a == "-v" || a == "--version")
    {
        println!("{} {}", version::NAME, version::VERSION);
        return Ok(());
    }

    logging::init();

    let app_config = config::AgentConfig::load()?;
    let key = app_config.load_key()?;

    let probe = Arc::new(sysinfo_repo::SysinfoRepo::new());

    let containers: Option<Arc<dyn ContainerStatsSource>> = if app_config.docker.enabled {
        match DockerRepo::connect() {
            Ok(repo) => Some(Arc::new(repo)),
            Err(e) => {
                tracing::warn!(error = %e, "Docker unavailable, container stats disabled");
                None
            }
        }
    } else {
        None
    };

    let gpu = if app_config.gpu.enabled {
        match GpuManager::start(Arc::new(TokioCommandRunner), &app_config.gpu).await {
            Ok(manager) => Some(manager),
            Err(e) => {
                tracing::debug!(error = %e, "GPU monitoring disabled");
                None
            }
        }
    } else {
        None
    };

    let agent_config = app_config.clone();
    let agent = tokio::task::spawn_blocking(move || {
        Agent::new(
            AgentDeps {
                probe,
                containers,
                gpu,
            },
            &agent_config,
        )
    })
    .await
    .map_err(|e| anyhow::anyhow!("agent init: {}", e))?;
    let agent = Arc::new(agent);

    if tracing::enabled!(tracing::Level::DEBUG) {
        let snapshot = agent.gather_stats().await;
        tracing::debug!(
            info = ?snapshot.info,
            stats = ?snapshot.stats,
            containers = snapshot.containers.len(),
            "initial snapshot"
        );
    }

    let app = routes::app(agent, key);
    let listener = tokio::net::TcpListener::bind(&app_config.server.listen).await?;
    tracing::info!("Listening on http://{}", app_config.server.listen);

    tokio::select! {
        result = axum::serve(listener, app) => {
            result?;
        }
        _ = async {
            #[cfg(unix)]
            {
                let mut sigterm = match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                    Ok(s) => s,
                    Err(_) => {
                        let _ = tokio::signal::ctrl_c().await;
                        return;
                    }
                };
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = sigterm.recv() => {}
                }
            }
            #[cfg(not(unix))]
            {
                let _ = tokio::signal::ctrl_c().await;
            }
        } => {
            tracing::info!("Received shutdown signal");
        }
    }

    Ok(())
}
