/// Error type shared by the supervisor, the window controller and startup.
#[derive(Debug)]
pub enum ShellError {
    /// The backend was already started once in this run.
    AlreadyStarted,
    /// The backend executable could not be spawned.
    Spawn(String),
    /// A window could not be created or driven.
    Window(String),
    /// The configured backend address is not a valid URL.
    InvalidUrl(String),
    Io(std::io::Error),
}

impl std::fmt::Display for ShellError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ShellError::AlreadyStarted => write!(f, "Backend already started in this run"),
            ShellError::Spawn(m) => write!(f, "Failed to spawn backend: {}", m),
            ShellError::Window(m) => write!(f, "Window error: {}", m),
            ShellError::InvalidUrl(m) => write!(f, "Invalid backend URL: {}", m),
            ShellError::Io(e) => write!(f, "IO error: {}", e),
        }
    }
}

impl std::error::Error for ShellError {}

impl From<std::io::Error> for ShellError {
    fn from(e: std::io::Error) -> Self {
        ShellError::Io(e)
    }
}

impl From<tauri::Error> for ShellError {
    fn from(e: tauri::Error) -> Self {
        ShellError::Window(e.to_string())
    }
}
