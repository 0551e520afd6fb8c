/// Termination sequencer: kill and reap every child in a fixed order.
use crate::launcher::{ManagedChild, Role};
use crate::startup::Children;
use std::process::ExitStatus;
use std::time::Duration;

/// Order in which children are stopped.
///
/// Not the reverse of spawn order: selenium goes first and code-server last.
pub const TEARDOWN_ORDER: [Role; 4] = [
    Role::AutomationServer,
    Role::WindowManager,
    Role::GraphicalServer,
    Role::EditorServer,
];

/// How long to wait for the relay to drain once its child is gone.
const RELAY_DRAIN: Duration = Duration::from_secs(2);

/// What happened to one child during teardown.
#[derive(Debug)]
pub struct StopRecord {
    pub role: Role,
    /// The child had been started and a kill was attempted.
    pub attempted: bool,
    /// The kill signal was delivered.
    pub killed: bool,
    /// Exit status once reaped.
    pub status: Option<ExitStatus>,
}

impl Children {
    fn slot_mut(&mut self, role: Role) -> &mut ManagedChild {
        match role {
            Role::GraphicalServer => &mut self.graphical_server,
            Role::WindowManager => &mut self.window_manager,
            Role::AutomationServer => &mut self.automation_server,
            Role::EditorServer => &mut self.editor_server,
        }
    }

    /// Consume the handles, yielding them in [`TEARDOWN_ORDER`].
    pub fn into_teardown_order(mut self) -> [ManagedChild; 4] {
        TEARDOWN_ORDER
            .map(|role| std::mem::replace(self.slot_mut(role), ManagedChild::not_started(role)))
    }
}

/// Kill one child and wait for it to exit. Failures are logged, not returned.
pub async fn stop(mut managed: ManagedChild) -> StopRecord {
    let role = managed.role;
    let Some(child) = managed.child.as_mut() else {
        tracing::info!(role = %role, "{role} was never started, nothing to stop");
        return StopRecord {
            role,
            attempted: false,
            killed: false,
            status: None,
        };
    };

    tracing::info!(role = %role, pid = managed.pid, "stopping {role}");
    let killed = match child.start_kill() {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(role = %role, error = %e, "failed to kill {role}");
            false
        }
    };

    let status = match child.wait().await {
        Ok(status) => {
            tracing::debug!(role = %role, %status, "{role} exited");
            Some(status)
        }
        Err(e) => {
            tracing::warn!(role = %role, error = %e, "failed to wait for {role}");
            None
        }
    };

    StopRecord {
        role,
        attempted: true,
        killed,
        status,
    }
}

/// Stop every child in [`TEARDOWN_ORDER`], continuing past any failure.
pub async fn stop_all(mut children: Children) -> Vec<StopRecord> {
    let relay = children.relay.take();
    let mut records = Vec::with_capacity(TEARDOWN_ORDER.len());
    for managed in children.into_teardown_order() {
        records.push(stop(managed).await);
    }

    if let Some(relay) = relay {
        match tokio::time::timeout(RELAY_DRAIN, relay).await {
            Ok(Ok(lines)) => tracing::debug!(lines, "output relay finished"),
            Ok(Err(e)) => tracing::debug!(error = %e, "output relay task failed"),
            Err(_) => tracing::debug!("output relay still open after teardown"),
        }
    }
    records
}
