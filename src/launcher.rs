/// Spawning of the supervised children.
///
/// Each child is started without waiting for it to initialize. Spawn failures
/// are returned so startup can log them and carry on with a stopped handle.
use crate::config::CommandSpec;
use nix::fcntl::OFlag;
use std::os::fd::OwnedFd;
use std::process::Stdio;
use tokio::net::unix::pipe;
use tokio::process::{Child, Command};

/// The four children the supervisor manages, in spawn order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    GraphicalServer,
    WindowManager,
    AutomationServer,
    EditorServer,
}

impl Role {
    /// Short name used in log lines.
    pub fn label(self) -> &'static str {
        match self {
            Role::GraphicalServer => "xvnc",
            Role::WindowManager => "fluxbox",
            Role::AutomationServer => "selenium",
            Role::EditorServer => "code-server",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// What to do with a child's stdout and stderr.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Send both streams to the null device.
    Discard,
    /// Send both streams into one pipe read by the supervisor.
    Capture,
}

/// Errors that can occur while launching a child.
#[derive(Debug)]
pub enum LaunchError {
    /// The combined output pipe could not be created.
    Pipe { role: Role, source: std::io::Error },
    /// The OS refused to start the program.
    Spawn {
        role: Role,
        program: String,
        source: std::io::Error,
    },
}

impl std::fmt::Display for LaunchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LaunchError::Pipe { role, source } => {
                write!(f, "failed to create output pipe for {}: {}", role, source)
            }
            LaunchError::Spawn {
                role,
                program,
                source,
            } => write!(f, "failed to spawn {} ({}): {}", role, program, source),
        }
    }
}

impl std::error::Error for LaunchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            LaunchError::Pipe { source, .. } => Some(source),
            LaunchError::Spawn { source, .. } => Some(source),
        }
    }
}

/// Handle to one supervised child.
///
/// `child` is `None` when the spawn failed; teardown skips such handles.
#[derive(Debug)]
pub struct ManagedChild {
    pub role: Role,
    pub pid: Option<u32>,
    pub child: Option<Child>,
    /// Read end of the shared stdout/stderr pipe, for `OutputMode::Capture`.
    pub output: Option<pipe::Receiver>,
}

impl ManagedChild {
    /// A handle for a child that never started.
    pub fn not_started(role: Role) -> Self {
        Self {
            role,
            pid: None,
            child: None,
            output: None,
        }
    }

    #[allow(dead_code)]
    pub fn is_started(&self) -> bool {
        self.child.is_some()
    }

    /// Hand the captured output to a reader, leaving `None` behind.
    pub fn take_output(&mut self) -> Option<pipe::Receiver> {
        self.output.take()
    }
}

/// One close-on-exec pipe: the async read end, plus a write end for stdout
/// and a duplicate of it for stderr.
fn shared_pipe() -> std::io::Result<(pipe::Receiver, OwnedFd, OwnedFd)> {
    let (read_end, write_end) = nix::unistd::pipe2(OFlag::O_CLOEXEC)?;
    let write_dup = write_end.try_clone()?;
    let receiver = pipe::Receiver::from_owned_fd(read_end)?;
    Ok((receiver, write_end, write_dup))
}

/// Start `spec` for `role` and return immediately.
pub fn launch(
    role: Role,
    spec: &CommandSpec,
    output: OutputMode,
) -> Result<ManagedChild, LaunchError> {
    tracing::info!(role = %role, program = %spec.program, args = ?spec.args, "starting {role}");

    let mut command = Command::new(&spec.program);
    command.args(&spec.args).stdin(Stdio::null());

    let receiver = match output {
        OutputMode::Discard => {
            command.stdout(Stdio::null()).stderr(Stdio::null());
            None
        }
        OutputMode::Capture => {
            let (receiver, stdout, stderr) =
                shared_pipe().map_err(|source| LaunchError::Pipe { role, source })?;
            command.stdout(Stdio::from(stdout)).stderr(Stdio::from(stderr));
            Some(receiver)
        }
    };

    let spawned = command.spawn();
    // The command holds our copies of the write end; the reader only sees EOF once they close
    drop(command);
    let child = spawned.map_err(|source| LaunchError::Spawn {
        role,
        program: spec.program.clone(),
        source,
    })?;

    let pid = child.id();
    tracing::info!(role = %role, pid, "{role} started");

    Ok(ManagedChild {
        role,
        pid,
        child: Some(child),
        output: receiver,
    })
}
