use clap::{Parser, Subcommand};
use hsr_core::config::{
    bag_temp_dir_from_env_value, data_dir_from_env_value, doi_prefix_from_env_value,
    resource_types_from_env_value, version_label_from_env_value,
};
use hsr_core::{CoreConfig, NewResource, Requester, ResourceService, UploadedFile};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "hsr")]
#[command(about = "HSR resource repository CLI")]
struct Cli {
    /// Act as this user instead of the system
    #[arg(long, global = true)]
    user: Option<String>,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Register a user
    AddUser {
        username: String,
        email: String,
        /// Display name
        #[arg(long)]
        full_name: Option<String>,
    },
    /// Register an empty group
    AddGroup { name: String },
    /// Add a user to a group
    AddMember { group: String, user: String },
    /// Create a resource
    Create {
        /// Registered resource type, e.g. GenericResource
        resource_type: String,
        title: String,
        /// Owner username or email (required when acting as the system)
        #[arg(long)]
        owner: Option<String>,
        #[arg(long)]
        description: Option<String>,
        /// Keywords (comma-separated)
        #[arg(long)]
        keywords: Option<String>,
        /// Files to upload
        #[arg(long = "file")]
        files: Vec<PathBuf>,
    },
    /// List all resources
    List,
    /// Print a resource record as JSON
    Show { pid: String },
    /// Upload files into a resource
    AddFile { pid: String, files: Vec<PathBuf> },
    /// Write a resource file to disk, or to stdout without --out
    GetFile {
        pid: String,
        filename: String,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Delete a resource file
    DeleteFile { pid: String, filename: String },
    /// Create the bag of the current version
    Bag { pid: String },
    /// Verify the most recent stored bag
    VerifyBag { pid: String },
    /// Publish a resource and mint its DOI
    Publish { pid: String },
    /// Find the resource holding a DOI
    ResolveDoi { doi: String },
    /// Show commit history
    History { pid: String },
    /// Delete a resource
    Delete { pid: String },
}

fn config() -> Result<Arc<CoreConfig>, Box<dyn std::error::Error>> {
    let data_dir = data_dir_from_env_value(std::env::var("HSR_DATA_DIR").ok());
    std::fs::create_dir_all(&data_dir)?;
    Ok(Arc::new(CoreConfig::new(
        data_dir,
        bag_temp_dir_from_env_value(std::env::var("HSR_BAG_TEMP_DIR").ok()),
        resource_types_from_env_value(std::env::var("HSR_RESOURCE_TYPES").ok())?,
        version_label_from_env_value(std::env::var("HSR_VERSION_LABEL").ok()),
        doi_prefix_from_env_value(std::env::var("HSR_DOI_PREFIX").ok()),
    )?))
}

fn read_uploads(paths: &[PathBuf]) -> std::io::Result<Vec<UploadedFile>> {
    paths
        .iter()
        .map(|path| {
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            Ok(UploadedFile::new(name, std::fs::read(path)?))
        })
        .collect()
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let requester = match cli.user {
        Some(user) => Requester::user(user),
        None => Requester::System,
    };

    let Some(command) = cli.command else {
        println!("Use --help for usage information");
        return Ok(());
    };
    let service = ResourceService::new(config()?);

    match command {
        Commands::AddUser {
            username,
            email,
            full_name,
        } => match service
            .accounts()
            .and_then(|mut a| a.add_user(&username, &email, full_name.as_deref()))
        {
            Ok(user) => println!("Registered user: {}", user.username),
            Err(e) => eprintln!("Error registering user: {}", e),
        },
        Commands::AddGroup { name } => {
            match service.accounts().and_then(|mut a| a.add_group(&name)) {
                Ok(group) => println!("Registered group: {}", group.name),
                Err(e) => eprintln!("Error registering group: {}", e),
            }
        }
        Commands::AddMember { group, user } => match service
            .accounts()
            .and_then(|mut a| a.add_group_member(&group, &user))
        {
            Ok(group) => println!("Group {} members: {}", group.name, group.members.join(", ")),
            Err(e) => eprintln!("Error adding member: {}", e),
        },
        Commands::Create {
            resource_type,
            title,
            owner,
            description,
            keywords,
            files,
        } => {
            let mut new = NewResource::new(resource_type, title);
            new.owner = owner;
            new.description = description;
            new.keywords = keywords
                .map(|k| {
                    k.split(',')
                        .map(|s| s.trim().to_string())
                        .filter(|s| !s.is_empty())
                        .collect()
                })
                .unwrap_or_default();
            new.files = read_uploads(&files)?;
            match service.create_resource(&requester, new) {
                Ok(resource) => println!("Created resource with pid: {}", resource.short_key),
                Err(e) => eprintln!("Error creating resource: {}", e),
            }
        }
        Commands::List => match service.list_resources() {
            Ok(resources) if resources.is_empty() => println!("No resources found."),
            Ok(resources) => {
                for r in resources {
                    println!(
                        "PID: {}, Type: {}, Title: {}, Updated: {}{}",
                        r.short_key,
                        r.resource_type,
                        r.title,
                        r.updated,
                        if r.published_and_frozen { " (published)" } else { "" }
                    );
                }
            }
            Err(e) => eprintln!("Error listing resources: {}", e),
        },
        Commands::Show { pid } => match service.get_record(&pid) {
            Ok(resource) => println!("{}", serde_json::to_string_pretty(&resource)?),
            Err(e) => eprintln!("Error reading resource: {}", e),
        },
        Commands::AddFile { pid, files } => {
            let uploads = read_uploads(&files)?;
            match service.add_resource_files(&requester, &pid, uploads) {
                Ok(outcome) => {
                    for file in &outcome.value {
                        println!("Added {} ({} bytes)", file.name, file.size_bytes);
                    }
                    if outcome.new_version {
                        println!("New version created: {}", outcome.short_key);
                    }
                }
                Err(e) => eprintln!("Error adding files: {}", e),
            }
        }
        Commands::GetFile { pid, filename, out } => {
            match service.get_resource_file(&pid, &filename) {
                Ok(content) => match out {
                    Some(path) => {
                        std::fs::write(&path, &content.bytes)?;
                        println!("Wrote {} to {}", filename, path.display());
                    }
                    None => {
                        use std::io::Write;
                        std::io::stdout().write_all(&content.bytes)?;
                    }
                },
                Err(e) => eprintln!("Error reading file: {}", e),
            }
        }
        Commands::DeleteFile { pid, filename } => {
            match service.delete_resource_file(&requester, &pid, &filename) {
                Ok(outcome) if outcome.new_version => println!(
                    "Deleted {} in new version {}",
                    outcome.value, outcome.short_key
                ),
                Ok(outcome) => println!("Deleted {}", outcome.value),
                Err(e) => eprintln!("Error deleting file: {}", e),
            }
        }
        Commands::Bag { pid } => match service.create_bag(&requester, &pid) {
            Ok(bag) => println!(
                "Bag {}: {} (md5 {}, {} bytes)",
                bag.version, bag.filename, bag.md5, bag.size_bytes
            ),
            Err(e) => eprintln!("Error creating bag: {}", e),
        },
        Commands::VerifyBag { pid } => match service.verify_stored_bag(&pid) {
            Ok(report) => println!(
                "Bag {} is valid: {} payload file(s), Payload-Oxum {}",
                report.top_folder,
                report.manifest.len(),
                report.payload_oxum
            ),
            Err(e) => eprintln!("Bag verification failed: {}", e),
        },
        Commands::Publish { pid } => match service.publish_resource(&requester, &pid) {
            Ok(resource) => println!(
                "Published {} with DOI {}",
                resource.short_key,
                resource.doi.as_deref().unwrap_or("-")
            ),
            Err(e) => eprintln!("Error publishing resource: {}", e),
        },
        Commands::ResolveDoi { doi } => match service.resolve_doi(&doi) {
            Ok(key) => println!("{}", key),
            Err(e) => eprintln!("Error resolving DOI: {}", e),
        },
        Commands::History { pid } => match service.history(&pid) {
            Ok(commits) => {
                for c in commits {
                    println!(
                        "{} {} <{}> {}",
                        &c.id[..c.id.len().min(8)],
                        c.author_name,
                        c.author_email,
                        c.summary
                    );
                }
            }
            Err(e) => eprintln!("Error reading history: {}", e),
        },
        Commands::Delete { pid } => match service.delete_resource(&requester, &pid) {
            Ok(key) => println!("Deleted resource {}", key),
            Err(e) => eprintln!("Error deleting resource: {}", e),
        },
    }

    Ok(())
}
