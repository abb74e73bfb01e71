//! State sinks mirror the provisioner state into places where other systems can observe it.
pub mod eventlog;
pub mod qedit;

use std::future::Future;
use std::pin::Pin;

use crate::provisioner::{Identity, ProvisionResult, ProvisionerState};

pub trait StateSink {
    /// Record that the provisioner of job `identity` has entered `state` while managing the pool
    /// `resource_id`.
    fn report(
        &self,
        identity: &Identity,
        state: ProvisionerState,
        resource_id: &str,
    ) -> Pin<Box<dyn Future<Output = ProvisionResult<()>>>>;
}

/// Reports every state change to all inner sinks, one after another.
///
/// A failing sink does not prevent the following sinks from receiving the report.
/// The first error is returned.
#[derive(Default)]
pub struct MultiSink {
    sinks: Vec<Box<dyn StateSink>>,
}

impl MultiSink {
    pub fn add<S: StateSink + 'static>(&mut self, sink: S) {
        self.sinks.push(Box::new(sink));
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

impl StateSink for MultiSink {
    fn report(
        &self,
        identity: &Identity,
        state: ProvisionerState,
        resource_id: &str,
    ) -> Pin<Box<dyn Future<Output = ProvisionResult<()>>>> {
        let reports: Vec<_> = self
            .sinks
            .iter()
            .map(|sink| sink.report(identity, state, resource_id))
            .collect();

        Box::pin(async move {
            let mut result = Ok(());
            for report in reports {
                if let Err(error) = report.await {
                    if result.is_ok() {
                        result = Err(error);
                    } else {
                        log::debug!("Additional state sink failure: {error:?}");
                    }
                }
            }
            result
        })
    }
}
