use serde::Serialize;
use std::path::PathBuf;

/// Location of the packaged VS Code extension installed at startup, if present.
pub const EXTENSION_ASSET: &str = "/data/ansible-latest.vsix";

/// Environment variables the supervisor reads. All are required.
pub const REQUIRED_VARS: [&str; 9] = [
    "DISPLAY",
    "VNC_GEOMETRY",
    "VNC_PORT",
    "HOME",
    "SELENIUM_PATH",
    "SELENIUM_HTTP_JDK_CLIENT_PATH",
    "SELENIUM_PORT",
    "SELENIUM_SESSION_TIMEOUT",
    "API_PORT",
];

/// Configuration bundle assembled once from the environment and handed to startup.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SupervisorConfig {
    pub display: String,
    pub vnc_geometry: String,
    pub vnc_port: u16,
    pub home: PathBuf,
    pub selenium_path: String,
    pub selenium_http_jdk_client_path: String,
    pub selenium_port: u16,
    pub selenium_session_timeout: String,
    pub api_port: u16,
}

/// Errors raised while reading configuration from the environment.
#[derive(Debug, PartialEq, Eq)]
pub enum ConfigError {
    /// A required variable is unset or not valid unicode.
    Missing { var: &'static str },
    /// A port variable does not parse as a TCP port.
    InvalidPort { var: &'static str, value: String },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Missing { var } => {
                write!(f, "required environment variable {} is not set", var)
            }
            ConfigError::InvalidPort { var, value } => {
                write!(f, "{} must be a TCP port, got {:?}", var, value)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// A program and its ordered arguments.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
}

impl CommandSpec {
    pub fn new<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }
}

impl SupervisorConfig {
    /// Read the configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Build the configuration from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |var: &'static str| lookup(var).ok_or(ConfigError::Missing { var });
        let port = |var: &'static str| -> Result<u16, ConfigError> {
            let value = get(var)?;
            value
                .trim()
                .parse::<u16>()
                .map_err(|_| ConfigError::InvalidPort { var, value })
        };

        Ok(Self {
            display: get("DISPLAY")?,
            vnc_geometry: get("VNC_GEOMETRY")?,
            vnc_port: port("VNC_PORT")?,
            home: PathBuf::from(get("HOME")?),
            selenium_path: get("SELENIUM_PATH")?,
            selenium_http_jdk_client_path: get("SELENIUM_HTTP_JDK_CLIENT_PATH")?,
            selenium_port: port("SELENIUM_PORT")?,
            selenium_session_timeout: get("SELENIUM_SESSION_TIMEOUT")?,
            api_port: port("API_PORT")?,
        })
    }

    /// Xvnc serving the virtual display over VNC.
    pub fn xvnc_command(&self) -> CommandSpec {
        let auth = self.home.join(".Xauthority");
        CommandSpec::new(
            "Xvnc",
            [
                self.display.clone(),
                "-alwaysshared".into(),
                "-depth".into(),
                "16".into(),
                "-geometry".into(),
                self.vnc_geometry.clone(),
                "-securitytypes".into(),
                "none".into(),
                "-auth".into(),
                auth.display().to_string(),
                "-fp".into(),
                "catalogue:/etc/X11/fontpath.d".into(),
                "-pn".into(),
                "-rfbport".into(),
                self.vnc_port.to_string(),
            ],
        )
    }

    pub fn fluxbox_command(&self) -> CommandSpec {
        CommandSpec::new("fluxbox", Vec::<String>::new())
    }

    /// Selenium standalone using the JDK http client extension.
    pub fn selenium_command(&self) -> CommandSpec {
        CommandSpec::new(
            "java",
            [
                "-Dwebdriver.http.factory=jdk-http-client".to_string(),
                "-jar".into(),
                self.selenium_path.clone(),
                "--ext".into(),
                self.selenium_http_jdk_client_path.clone(),
                "standalone".into(),
                "--port".into(),
                self.selenium_port.to_string(),
                "--session-timeout".into(),
                self.selenium_session_timeout.clone(),
            ],
        )
    }

    pub fn code_server_command(&self) -> CommandSpec {
        CommandSpec::new("code-server", ["./workspace", "--auth", "none"])
    }
}

#[cfg(test)]
pub(crate) fn test_lookup(overrides: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let mut vars: std::collections::HashMap<String, String> = [
        ("DISPLAY", ":1"),
        ("VNC_GEOMETRY", "1920x1080"),
        ("VNC_PORT", "5901"),
        ("HOME", "/home/runner"),
        ("SELENIUM_PATH", "/opt/selenium/selenium-server.jar"),
        ("SELENIUM_HTTP_JDK_CLIENT_PATH", "/opt/selenium/jdk-client.jar"),
        ("SELENIUM_PORT", "4444"),
        ("SELENIUM_SESSION_TIMEOUT", "300"),
        ("API_PORT", "9999"),
    ]
    .iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect();
    for (k, v) in overrides {
        if v.is_empty() {
            vars.remove(*k);
        } else {
            vars.insert(k.to_string(), v.to_string());
        }
    }
    move |var: &str| vars.get(var).cloned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_lookup_reads_every_variable() {
        let config = SupervisorConfig::from_lookup(test_lookup(&[])).unwrap();
        assert_eq!(config.display, ":1");
        assert_eq!(config.vnc_geometry, "1920x1080");
        assert_eq!(config.vnc_port, 5901);
        assert_eq!(config.home, PathBuf::from("/home/runner"));
        assert_eq!(config.selenium_port, 4444);
        assert_eq!(config.selenium_session_timeout, "300");
        assert_eq!(config.api_port, 9999);
    }

    #[test]
    fn test_missing_variable_is_reported_by_name() {
        for var in REQUIRED_VARS {
            let err = SupervisorConfig::from_lookup(test_lookup(&[(var, "")])).unwrap_err();
            assert_eq!(err, ConfigError::Missing { var });
            assert!(err.to_string().contains(var));
        }
    }

    #[test]
    fn test_invalid_port_is_rejected() {
        let err =
            SupervisorConfig::from_lookup(test_lookup(&[("API_PORT", "http")])).unwrap_err();
        assert_eq!(
            err,
            ConfigError::InvalidPort {
                var: "API_PORT",
                value: "http".to_string()
            }
        );

        let err =
            SupervisorConfig::from_lookup(test_lookup(&[("VNC_PORT", "70000")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidPort { var: "VNC_PORT", .. }));
    }

    #[test]
    fn test_xvnc_command_line() {
        let config = SupervisorConfig::from_lookup(test_lookup(&[])).unwrap();
        let cmd = config.xvnc_command();
        assert_eq!(cmd.program, "Xvnc");
        assert_eq!(
            cmd.args,
            vec![
                ":1",
                "-alwaysshared",
                "-depth",
                "16",
                "-geometry",
                "1920x1080",
                "-securitytypes",
                "none",
                "-auth",
                "/home/runner/.Xauthority",
                "-fp",
                "catalogue:/etc/X11/fontpath.d",
                "-pn",
                "-rfbport",
                "5901",
            ]
        );
    }

    #[test]
    fn test_selenium_command_line() {
        let config = SupervisorConfig::from_lookup(test_lookup(&[])).unwrap();
        let cmd = config.selenium_command();
        assert_eq!(cmd.program, "java");
        assert_eq!(
            cmd.args,
            vec![
                "-Dwebdriver.http.factory=jdk-http-client",
                "-jar",
                "/opt/selenium/selenium-server.jar",
                "--ext",
                "/opt/selenium/jdk-client.jar",
                "standalone",
                "--port",
                "4444",
                "--session-timeout",
                "300",
            ]
        );
    }

    #[test]
    fn test_fluxbox_and_code_server_command_lines() {
        let config = SupervisorConfig::from_lookup(test_lookup(&[])).unwrap();
        assert_eq!(config.fluxbox_command(), CommandSpec::new("fluxbox", Vec::<String>::new()));
        let code = config.code_server_command();
        assert_eq!(code.program, "code-server");
        assert_eq!(code.args, vec!["./workspace", "--auth", "none"]);
    }
}
