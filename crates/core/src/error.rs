#[derive(Debug, thiserror::Error)]
pub enum ResourceError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("invalid content: {0}")]
    InvalidContent(String),
    #[error("resource not found: {0}")]
    NotFound(String),
    #[error("file not found: {0}")]
    FileNotFound(String),
    #[error("user not found: {0}")]
    UserNotFound(String),
    #[error("group not found: {0}")]
    GroupNotFound(String),
    #[error("unknown resource type: {0}")]
    UnknownResourceType(String),
    #[error("a requesting user is required")]
    Unauthenticated,
    #[error("not authorized: {0}")]
    NotAuthorized(String),
    #[error("file already exists: {0}")]
    DuplicateFile(String),
    #[error("account already exists: {0}")]
    DuplicateAccount(String),
    #[error("resource {0} has already been obsoleted by a newer version")]
    AlreadyObsoleted(String),
    #[error("not implemented: {0}")]
    NotImplemented(&'static str),
    #[error("stored bag {version} failed its checksum: recorded {expected}, actual {actual}")]
    BagChecksumMismatch {
        version: String,
        expected: String,
        actual: String,
    },

    #[error("text error: {0}")]
    Text(#[from] hsr_types::TextError),
    #[error("identifier error: {0}")]
    Uuid(#[from] hsr_uuid::UuidError),
    #[error("payload storage error: {0}")]
    Files(#[from] hsr_files::FilesError),
    #[error("bag error: {0}")]
    Bag(#[from] hsr_bagit::BagError),

    #[error("failed to create storage directory: {0}")]
    StorageDirCreation(std::io::Error),
    #[error("failed to create resource directory: {0}")]
    ResourceDirCreation(std::io::Error),
    #[error(
        "initialise failed and cleanup also failed (path: {path}): init={init_error}; cleanup={cleanup_error}",
        path = path.display()
    )]
    CleanupAfterInitialiseFailed {
        path: std::path::PathBuf,
        #[source]
        init_error: Box<ResourceError>,
        cleanup_error: std::io::Error,
    },
    #[error("failed to write file: {0}")]
    FileWrite(std::io::Error),
    #[error("failed to read file: {0}")]
    FileRead(std::io::Error),
    #[error("failed to delete: {0}")]
    FileDelete(std::io::Error),
    #[error("failed to serialize JSON: {0}")]
    Serialization(serde_json::Error),
    #[error("failed to serialize YAML: {0}")]
    YamlSerialization(serde_yaml::Error),
    #[error("failed to deserialize YAML: {0}")]
    YamlDeserialization(serde_yaml::Error),

    #[error("failed to initialise git repository: {0}")]
    GitInit(git2::Error),
    #[error("failed to open git repository: {0}")]
    GitOpen(git2::Error),
    #[error("failed to access git index: {0}")]
    GitIndex(git2::Error),
    #[error("failed to add file to git index: {0}")]
    GitAdd(git2::Error),
    #[error("failed to write git tree: {0}")]
    GitWriteTree(git2::Error),
    #[error("failed to find git tree: {0}")]
    GitFindTree(git2::Error),
    #[error("failed to create git signature: {0}")]
    GitSignature(git2::Error),
    #[error("failed to create git commit: {0}")]
    GitCommit(git2::Error),
    #[error("failed to get git head: {0}")]
    GitHead(git2::Error),
    #[error("failed to set git head: {0}")]
    GitSetHead(git2::Error),
    #[error("failed to peel git commit: {0}")]
    GitPeel(git2::Error),
    #[error("failed to walk git history: {0}")]
    GitRevwalk(git2::Error),
    #[error("invalid timestamp")]
    InvalidTimestamp,
}

pub type ResourceResult<T> = std::result::Result<T, ResourceError>;
