/// Startup orchestration: bring the four children up in dependency order.
use crate::config::{CommandSpec, SupervisorConfig};
use crate::extension::{ExtensionInstaller, InstallOutcome};
use crate::launcher::{launch, ManagedChild, OutputMode, Role};
use crate::probe::{wait_for_port, ProbeSettings};
use crate::relay::relay;
use serde::Serialize;
use tokio::task::JoinHandle;

/// Everything startup needs, resolved up front.
#[derive(Debug, Clone, Serialize)]
pub struct StartupPlan {
    pub graphical_server: CommandSpec,
    pub window_manager: CommandSpec,
    pub automation_server: CommandSpec,
    pub editor_server: CommandSpec,
    /// Host and port probed before the window manager starts.
    pub display_host: String,
    pub display_port: u16,
    #[serde(skip)]
    pub probe: ProbeSettings,
    #[serde(skip)]
    pub extension: ExtensionInstaller,
}

impl StartupPlan {
    pub fn from_config(config: &SupervisorConfig) -> Self {
        Self {
            graphical_server: config.xvnc_command(),
            window_manager: config.fluxbox_command(),
            automation_server: config.selenium_command(),
            editor_server: config.code_server_command(),
            display_host: "localhost".to_string(),
            display_port: config.vnc_port,
            probe: ProbeSettings::default(),
            extension: ExtensionInstaller::default(),
        }
    }
}

/// The four supervised children, in spawn order.
#[derive(Debug)]
pub struct Children {
    pub graphical_server: ManagedChild,
    pub window_manager: ManagedChild,
    pub automation_server: ManagedChild,
    pub editor_server: ManagedChild,
    /// Relay of the automation server's combined output, if it started.
    pub relay: Option<JoinHandle<u64>>,
}

impl Children {
    /// Handles in spawn order.
    #[allow(dead_code)]
    pub fn iter(&self) -> impl Iterator<Item = &ManagedChild> {
        [
            &self.graphical_server,
            &self.window_manager,
            &self.automation_server,
            &self.editor_server,
        ]
        .into_iter()
    }
}

/// Launch a child, turning a spawn failure into a not-started handle.
fn launch_or_log(role: Role, spec: &CommandSpec, output: OutputMode) -> ManagedChild {
    match launch(role, spec, output) {
        Ok(child) => child,
        Err(e) => {
            tracing::error!(role = %role, error = %e, "spawn failed, continuing without {role}");
            ManagedChild::not_started(role)
        }
    }
}

/// Start the graphical server, window manager, automation server and editor server.
///
/// Steps run strictly in order. Nothing is retried or rolled back.
pub async fn start(plan: &StartupPlan) -> Children {
    let graphical_server = launch_or_log(
        Role::GraphicalServer,
        &plan.graphical_server,
        OutputMode::Discard,
    );

    let readiness = wait_for_port(&plan.display_host, plan.display_port, plan.probe).await;
    if readiness.ready {
        tracing::info!(
            port = plan.display_port,
            attempts = readiness.attempts,
            "display server is accepting connections"
        );
    } else {
        tracing::warn!(
            port = plan.display_port,
            attempts = readiness.attempts,
            "display server not reachable, starting window manager anyway"
        );
    }

    let window_manager = launch_or_log(
        Role::WindowManager,
        &plan.window_manager,
        OutputMode::Discard,
    );

    if let InstallOutcome::Failed(reason) = plan.extension.install().await {
        tracing::debug!(reason = %reason, "continuing without the extension");
    }

    let mut automation_server = launch_or_log(
        Role::AutomationServer,
        &plan.automation_server,
        OutputMode::Capture,
    );
    let relay_task = automation_server
        .take_output()
        .map(|output| tokio::spawn(relay(output, tokio::io::stdout())));

    let editor_server = launch_or_log(
        Role::EditorServer,
        &plan.editor_server,
        OutputMode::Discard,
    );

    Children {
        graphical_server,
        window_manager,
        automation_server,
        editor_server,
        relay: relay_task,
    }
}

#[cfg(test)]
pub(crate) fn sleep_plan(asset: &std::path::Path) -> StartupPlan {
    let sleeper = CommandSpec::new("sleep", ["30"]);
    StartupPlan {
        graphical_server: sleeper.clone(),
        window_manager: sleeper.clone(),
        automation_server: CommandSpec::new("sh", ["-c", "echo selenium-ready; exec sleep 30"]),
        editor_server: sleeper,
        display_host: "127.0.0.1".to_string(),
        display_port: 1,
        probe: ProbeSettings {
            attempts: 2,
            interval: std::time::Duration::from_millis(10),
        },
        extension: ExtensionInstaller::new("nonexistent-installer-xyz", asset),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_lookup;
    use crate::teardown::stop_all;
    use tempfile::tempdir;

    #[test]
    fn test_plan_from_config() {
        let config = SupervisorConfig::from_lookup(test_lookup(&[])).unwrap();
        let plan = StartupPlan::from_config(&config);

        assert_eq!(plan.graphical_server.program, "Xvnc");
        assert_eq!(plan.window_manager.program, "fluxbox");
        assert_eq!(plan.automation_server.program, "java");
        assert_eq!(plan.editor_server.program, "code-server");
        assert_eq!(plan.display_host, "localhost");
        assert_eq!(plan.display_port, 5901);
        assert_eq!(plan.probe, ProbeSettings::default());
        assert_eq!(plan.extension, ExtensionInstaller::default());
    }

    #[test]
    fn test_plan_serializes_commands() {
        let config = SupervisorConfig::from_lookup(test_lookup(&[])).unwrap();
        let json = serde_json::to_value(StartupPlan::from_config(&config)).unwrap();
        assert_eq!(json["graphical_server"]["program"], "Xvnc");
        assert_eq!(json["editor_server"]["args"][0], "./workspace");
        assert_eq!(json["display_port"], 5901);
        assert!(json.get("probe").is_none());
    }

    #[tokio::test]
    async fn test_start_produces_four_children_in_spawn_order() {
        let dir = tempdir().unwrap();
        let plan = sleep_plan(&dir.path().join("missing.vsix"));

        let children = start(&plan).await;
        let roles: Vec<Role> = children.iter().map(|c| c.role).collect();
        assert_eq!(
            roles,
            vec![
                Role::GraphicalServer,
                Role::WindowManager,
                Role::AutomationServer,
                Role::EditorServer,
            ]
        );
        assert!(children.iter().all(|c| c.is_started()));

        stop_all(children).await;
    }

    #[tokio::test]
    async fn test_only_automation_server_output_is_relayed() {
        let dir = tempdir().unwrap();
        let plan = sleep_plan(&dir.path().join("missing.vsix"));

        let children = start(&plan).await;
        assert!(children.relay.is_some());
        for child in children.iter() {
            // Relay took the automation server's pipe; everyone else never had one
            assert!(child.output.is_none(), "{} output", child.role);
            let inner = child.child.as_ref().unwrap();
            assert!(inner.stdout.is_none(), "{} stdout", child.role);
            assert!(inner.stderr.is_none(), "{} stderr", child.role);
        }

        stop_all(children).await;
    }

    #[tokio::test]
    async fn test_spawn_failure_keeps_going() {
        let dir = tempdir().unwrap();
        let mut plan = sleep_plan(&dir.path().join("missing.vsix"));
        plan.window_manager = CommandSpec::new("nonexistent-binary-xyz", Vec::<String>::new());

        let children = start(&plan).await;
        assert_eq!(children.iter().count(), 4);
        assert!(!children.window_manager.is_started());
        assert!(children.graphical_server.is_started());
        assert!(children.automation_server.is_started());
        assert!(children.editor_server.is_started());

        stop_all(children).await;
    }

    #[tokio::test]
    async fn test_failed_automation_server_has_no_relay() {
        let dir = tempdir().unwrap();
        let mut plan = sleep_plan(&dir.path().join("missing.vsix"));
        plan.automation_server = CommandSpec::new("nonexistent-binary-xyz", Vec::<String>::new());

        let children = start(&plan).await;
        assert!(children.relay.is_none());
        assert!(children.editor_server.is_started());

        stop_all(children).await;
    }
}
