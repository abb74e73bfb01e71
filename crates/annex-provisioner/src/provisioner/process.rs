use std::future::Future;
use std::time::{Duration, SystemTime};

use tokio::time::Instant;

use crate::common::error::ProvisionerError;
use crate::common::timeutils::{format_system_time, now_wallclock, remaining_until};
use crate::provisioner::fleet::{FleetHandler, Intent, PoolStatus};
use crate::provisioner::identity::IdentityResolver;
use crate::provisioner::poll::{PollOutcome, poll_until};
use crate::provisioner::sink::StateSink;
use crate::provisioner::{
    Identity, PollSchedule, ProvisionResult, ProvisionerConfig, ProvisionerState,
    ResourceRequest,
};

/// Says whether the intent of an operation still has to be sent to the fleet control plane.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum IntentMode {
    /// Send the intent, then wait for its outcome.
    Issue,
    /// The intent was sent by a previous run of the provisioner, only wait for its outcome.
    AlreadyIssued,
}

#[derive(Debug, Copy, Clone)]
enum PoolCondition {
    /// At least one member has joined the pool.
    Joined,
    /// At least one member has been terminated.
    Terminated,
}

impl PoolCondition {
    fn is_met(&self, status: &PoolStatus) -> bool {
        match self {
            PoolCondition::Joined => status.joined() > 0,
            PoolCondition::Terminated => status.terminated() > 0,
        }
    }

    fn as_str(&self) -> &'static str {
        match self {
            PoolCondition::Joined => "joined",
            PoolCondition::Terminated => "terminated",
        }
    }
}

/// Provisions a single pool for a single job.
///
/// The provisioner owns its state and the request; both are only touched by the sequential
/// [`Provisioner::run`] loop.
pub struct Provisioner {
    identity: Identity,
    request: ResourceRequest,
    state: ProvisionerState,
    config: ProvisionerConfig,
    fleet: Box<dyn FleetHandler>,
    sink: Box<dyn StateSink>,
}

impl Provisioner {
    /// Creates a provisioner for the job returned by `resolver`.
    ///
    /// Fails with [`ProvisionerError::IdentityUnresolvable`] if the job cannot be identified, in
    /// which case neither the fleet nor the sink are used at all.
    pub fn new(
        resolver: &dyn IdentityResolver,
        request: ResourceRequest,
        initial_state: ProvisionerState,
        config: ProvisionerConfig,
        fleet: Box<dyn FleetHandler>,
        sink: Box<dyn StateSink>,
    ) -> crate::Result<Self> {
        config.validate()?;
        let identity = resolver
            .resolve()
            .map_err(|error| ProvisionerError::IdentityUnresolvable(format!("{error:#}")))?;
        log::info!(
            "Provisioner of job {identity} manages pool {} ({} node(s), expires at {})",
            request.pool_name(),
            request.capacity(),
            format_system_time(request.expiration())
        );

        Ok(Self {
            identity,
            request,
            state: initial_state,
            config,
            fleet,
            sink,
        })
    }

    pub fn state(&self) -> ProvisionerState {
        self.state
    }

    /// Drives the pool through the rest of its lifecycle and returns the final state, which is
    /// either `DeprovisioningComplete` or `Failed`.
    pub async fn run(&mut self) -> ProvisionerState {
        log::info!("Current provisioner state is {}", self.state);
        if let Err(error) = self.run_lifecycle().await {
            self.fail(error).await;
        }
        log::info!("All done, provisioner state is {}", self.state);
        self.state
    }

    async fn run_lifecycle(&mut self) -> crate::Result<()> {
        // The initial state may come from a previous run, in that case its intent was already sent
        let mut intent = match self.state {
            ProvisionerState::New => IntentMode::Issue,
            _ => IntentMode::AlreadyIssued,
        };

        loop {
            match self.state {
                ProvisionerState::New => {
                    self.change_state(ProvisionerState::ProvisioningStarted)
                        .await?;
                }
                ProvisionerState::ProvisioningStarted => {
                    if intent == IntentMode::AlreadyIssued {
                        log::info!("Resuming provisioning of pool {}", self.request.pool_name());
                    }
                    acquire(
                        self.fleet.as_mut(),
                        &self.request,
                        intent,
                        self.config.provisioning_schedule(),
                    )
                    .await?;
                    self.change_state(ProvisionerState::ProvisioningComplete)
                        .await?;
                }
                ProvisionerState::ProvisioningComplete => {
                    log::info!(
                        "Holding pool {} until {}",
                        self.request.pool_name(),
                        format_system_time(self.request.expiration())
                    );
                    wait_until(self.request.expiration(), self.config.hold_log_interval).await;
                    self.change_state(ProvisionerState::DeprovisioningStarted)
                        .await?;
                }
                ProvisionerState::DeprovisioningStarted => {
                    if intent == IntentMode::AlreadyIssued {
                        log::info!(
                            "Resuming deprovisioning of pool {}",
                            self.request.pool_name()
                        );
                    }
                    release(
                        self.fleet.as_ref(),
                        self.request.pool_name(),
                        intent,
                        self.config.deprovisioning_schedule(),
                    )
                    .await?;
                    self.change_state(ProvisionerState::DeprovisioningComplete)
                        .await?;
                }
                ProvisionerState::DeprovisioningComplete | ProvisionerState::Failed => {
                    return Ok(());
                }
            }
            intent = IntentMode::Issue;
        }
    }

    /// Moves to `new_state` and reports it before anything else happens.
    /// A failed report is only logged.
    async fn change_state(&mut self, new_state: ProvisionerState) -> crate::Result<()> {
        self.state.check_transition(new_state)?;
        log::info!(
            "Provisioner of job {} enters state {new_state}",
            self.identity
        );
        self.state = new_state;

        let report = self
            .sink
            .report(&self.identity, new_state, self.request.pool_name());
        if let Err(error) = with_command_timeout(self.config.command_timeout, report).await {
            let error = ProvisionerError::SinkReportFailure {
                identity: self.identity.to_string(),
                state: new_state,
                reason: format!("{error:#}"),
            };
            log::warn!("{error}");
        }
        Ok(())
    }

    /// Nothing is cleaned up automatically, a partially created pool is left for the operator.
    async fn fail(&mut self, error: ProvisionerError) {
        let pool_name = self.request.pool_name().to_string();
        match self.state {
            ProvisionerState::DeprovisioningStarted => {
                log::error!(
                    "Failed to deprovision resources: {error}\n\
                    Please deprovision pool {pool_name} manually to avoid incurring extra costs."
                );
            }
            ProvisionerState::ProvisioningStarted => {
                log::error!(
                    "Failed to provision resources, aborting: {error}\n\
                    Pool {pool_name} may have been partially created, it will not be removed automatically."
                );
            }
            _ => log::error!("Provisioner failed: {error}"),
        }

        if let Err(error) = self.change_state(ProvisionerState::Failed).await {
            log::error!("{error}");
        }
    }
}

/// Asks the fleet for the requested pool (unless `intent` says it was already done) and waits
/// until at least one of its members joins.
///
/// A rejected intent (or one without an answer within the command timeout) fails immediately.
/// Otherwise the pool status is checked according to `schedule`.
pub async fn acquire(
    fleet: &mut dyn FleetHandler,
    request: &ResourceRequest,
    intent: IntentMode,
    schedule: PollSchedule,
) -> crate::Result<PoolStatus> {
    let pool_name = request.pool_name();
    if intent == IntentMode::Issue {
        log::info!(
            "Provisioning {} node(s) under annex {pool_name}",
            request.capacity()
        );
        with_command_timeout(schedule.command_timeout, fleet.create_pool(request))
            .await
            .map_err(|error| ProvisionerError::IntentRejected {
                intent: Intent::Create,
                pool: pool_name.to_string(),
                reason: format!("{error:#}"),
            })?;
    }
    wait_for_pool(fleet, pool_name, PoolCondition::Joined, schedule).await
}

/// Asks the fleet to terminate the pool (unless `intent` says it was already done) and waits
/// until at least one of its members is terminated.
pub async fn release(
    fleet: &dyn FleetHandler,
    pool_name: &str,
    intent: IntentMode,
    schedule: PollSchedule,
) -> crate::Result<PoolStatus> {
    if intent == IntentMode::Issue {
        log::info!("Deprovisioning annex {pool_name}");
        with_command_timeout(schedule.command_timeout, fleet.terminate_pool(pool_name))
            .await
            .map_err(|error| ProvisionerError::IntentRejected {
                intent: Intent::Terminate,
                pool: pool_name.to_string(),
                reason: format!("{error:#}"),
            })?;
    }
    wait_for_pool(fleet, pool_name, PoolCondition::Terminated, schedule).await
}

/// Abandons `future` if it does not finish within `limit`. Commands spawned by the future are
/// killed when it is dropped.
async fn with_command_timeout<T>(
    limit: Duration,
    future: impl Future<Output = ProvisionResult<T>>,
) -> ProvisionResult<T> {
    match tokio::time::timeout(limit, future).await {
        Ok(result) => result,
        Err(_) => Err(anyhow::anyhow!(
            "No response within {}",
            humantime::format_duration(limit)
        )),
    }
}

async fn wait_for_pool(
    fleet: &dyn FleetHandler,
    pool_name: &str,
    condition: PoolCondition,
    schedule: PollSchedule,
) -> crate::Result<PoolStatus> {
    let budget = schedule.budget;
    let outcome = poll_until(
        schedule.interval,
        budget,
        |poll| {
            let status =
                with_command_timeout(schedule.command_timeout, fleet.get_pool_status(pool_name));
            async move {
                let status = status.await;
                if let Ok(status) = &status {
                    log::debug!(
                        "Waiting for pool {pool_name} to be {}, check {poll}/{budget}: {status}",
                        condition.as_str()
                    );
                }
                status
            }
        },
        |status| condition.is_met(status),
    )
    .await;

    match outcome {
        PollOutcome::Ready { value, polls } => {
            log::info!(
                "Pool {pool_name} is {} after {polls} status check(s): {value}",
                condition.as_str()
            );
            Ok(value)
        }
        PollOutcome::Exhausted { polls } => Err(ProvisionerError::PollTimeout {
            pool: pool_name.to_string(),
            condition: condition.as_str(),
            polls,
        }),
    }
}

/// Blocks until the wall clock reaches `deadline`, logging the remaining time every
/// `log_interval`. Returns immediately if the deadline has already passed.
pub async fn wait_until(deadline: SystemTime, log_interval: Duration) {
    let end = Instant::now() + remaining_until(deadline, now_wallclock());
    loop {
        let now = Instant::now();
        if now >= end {
            break;
        }
        let remaining = end - now;
        log::info!(
            "Waiting for expiration, {} remaining",
            humantime::format_duration(Duration::from_secs(remaining.as_secs()))
        );
        tokio::time::sleep(remaining.min(log_interval)).await;
    }
}
