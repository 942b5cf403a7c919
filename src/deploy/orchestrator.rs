// ABOUTME: Entry points that run a whole deployment against one host.
// ABOUTME: Validates, optionally builds, connects, drives the state machine and always closes the session.

use snafu::ResultExt;

use crate::config::{DeploymentConfig, ResolvedConfig};
use crate::session::{Connector, RemoteSession};

use super::Deployment;
use super::build::run_local_build;
use super::error::{ConfigurationSnafu, ConnectionSnafu, DeployError};
use super::events::{DeployEvent, DeployObserver, emit, start_step};
use super::plan::{DeployMode, DeployPlan, Step};
use super::rollback::close_session;
use super::transitions::DeployReport;

/// Build locally, then deploy the artifact tree.
///
/// # Errors
///
/// Returns the first fatal error. If a previous deployment had been moved
/// aside, it is restored before returning.
pub async fn full_deploy<C: Connector>(
    connector: &C,
    config: &DeploymentConfig,
    observer: &dyn DeployObserver,
) -> Result<DeployReport, DeployError> {
    orchestrate(connector, config, DeployMode::Full, observer).await
}

/// Deploy an artifact tree that has already been built.
///
/// # Errors
///
/// Same as [`full_deploy`], minus build failures.
pub async fn upload_only<C: Connector>(
    connector: &C,
    config: &DeploymentConfig,
    observer: &dyn DeployObserver,
) -> Result<DeployReport, DeployError> {
    orchestrate(connector, config, DeployMode::UploadOnly, observer).await
}

async fn orchestrate<C: Connector>(
    connector: &C,
    config: &DeploymentConfig,
    mode: DeployMode,
    observer: &dyn DeployObserver,
) -> Result<DeployReport, DeployError> {
    let result = prepare_and_run(connector, config, mode, observer).await;

    match &result {
        Ok(report) => {
            tracing::info!("Deployed to {}", report.remote_path);
            emit(
                observer,
                DeployEvent::Succeeded {
                    backup: report.backup.as_ref().map(ToString::to_string),
                },
            );
        }
        Err(e) => emit(
            observer,
            DeployEvent::Failed {
                error: e.to_string(),
            },
        ),
    }

    result
}

async fn prepare_and_run<C: Connector>(
    connector: &C,
    config: &DeploymentConfig,
    mode: DeployMode,
    observer: &dyn DeployObserver,
) -> Result<DeployReport, DeployError> {
    let resolved = config.validate().context(ConfigurationSnafu)?;

    if resolved.local_path_defaulted {
        tracing::warn!(
            "local_path not set, defaulting to {}",
            resolved.local_path.display()
        );
        emit(
            observer,
            DeployEvent::LocalPathDefaulted {
                path: resolved.local_path.display().to_string(),
            },
        );
    }

    let plan = DeployPlan::new(mode, resolved.reload_command.is_some());

    if mode == DeployMode::Full {
        start_step(&plan, Step::Build, observer);
        run_local_build(&resolved.build_command).await?;
    }

    start_step(&plan, Step::Connect, observer);
    let session = connect(connector, &resolved).await?;

    let result = run_remote(&session, resolved, &plan, observer).await;

    close_session(&session, observer).await;
    result
}

async fn connect<C: Connector>(
    connector: &C,
    config: &ResolvedConfig,
) -> Result<C::Session, DeployError> {
    let session_config = &config.session;
    tracing::info!(
        "Connecting to {}@{}:{}",
        session_config.user,
        session_config.host,
        session_config.port
    );
    connector
        .connect(session_config)
        .await
        .context(ConnectionSnafu {
            host: session_config.host.clone(),
            port: session_config.port,
        })
}

/// Drive the state machine on an open session, rolling back on failure.
async fn run_remote<R: RemoteSession + ?Sized>(
    session: &R,
    config: ResolvedConfig,
    plan: &DeployPlan,
    observer: &dyn DeployObserver,
) -> Result<DeployReport, DeployError> {
    let deployment = Deployment::new(config);

    start_step(plan, Step::Backup, observer);
    let deployment = match deployment.snapshot(session, observer).await {
        Ok(d) => d,
        Err((failed, e)) => return Err(failed.abort(session, e, observer).await),
    };

    start_step(plan, Step::Upload, observer);
    let deployment = match deployment.prepare_target(session, observer).await {
        Ok(d) => d,
        Err((failed, e)) => return Err(failed.abort(session, e, observer).await),
    };

    let deployment = match deployment.upload(session, observer).await {
        Ok(d) => d,
        Err((failed, e)) => return Err(failed.abort(session, e, observer).await),
    };

    start_step(plan, Step::Reload, observer);
    let deployment = match deployment.reload(session, observer).await {
        Ok(d) => d,
        Err((failed, e)) => return Err(failed.abort(session, e, observer).await),
    };

    Ok(deployment.finish())
}
