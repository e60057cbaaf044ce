use clap::{Parser, Subcommand};
use reqwest::{header, Client, RequestBuilder};
use serde_json::json;
use std::fs;

use mongo_admin::auth::{generate_secure_password, SESSION_COOKIE};
use mongo_admin::models::PermissionSetRef;
use mongo_admin::permissions::{PermissionGrant, PermissionSetBuilder};

const SESSION_FILE: &str = ".mongo_admin_session";

#[derive(Parser)]
#[command(name = "mongo-admin-cli")]
#[command(about = "CLI for the mongo_admin panel", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(short, long, default_value = "http://localhost:3000")]
    url: String,
}

#[derive(Subcommand)]
enum Commands {
    Login {
        #[arg(short, long, env = "MONGODB_URI", default_value = "mongodb://localhost:27017")]
        server_uri: String,
        #[arg(short, long)]
        username: Option<String>,
        #[arg(short, long)]
        password: Option<String>,
    },
    Verify,
    Logout,
    ListUsers,
    CreateUser {
        #[arg(short, long)]
        username: String,
        #[arg(short, long, conflicts_with = "generate_password")]
        password: Option<String>,
        #[arg(short, long)]
        generate_password: bool,
        #[arg(short, long, default_value = "admin")]
        database: String,
        /// role or role@db, repeatable
        #[arg(short, long = "role", required = true)]
        roles: Vec<String>,
    },
    DeleteUser {
        #[arg(short, long)]
        username: String,
        #[arg(short, long, default_value = "admin")]
        database: String,
    },
    GrantRoles {
        #[arg(short, long)]
        username: String,
        #[arg(short, long, default_value = "admin")]
        database: String,
        #[arg(short, long = "role", required = true)]
        roles: Vec<String>,
    },
    RevokeRoles {
        #[arg(short, long)]
        username: String,
        #[arg(short, long, default_value = "admin")]
        database: String,
        #[arg(short, long = "role", required = true)]
        roles: Vec<String>,
    },
    ListRoles,
    CreateRole {
        #[arg(short, long)]
        name: String,
        #[arg(short, long, default_value = "admin")]
        database: String,
        /// Inherited role, role or role@db
        #[arg(short, long = "inherit")]
        inherits: Vec<String>,
        /// global:a,b | database:<db>:a,b | collection:<db>.<coll>:a,b | collection:<db>.*:a,b
        #[arg(short, long = "grant")]
        grants: Vec<String>,
    },
    DeleteRole {
        #[arg(short, long)]
        name: String,
        #[arg(short, long, default_value = "admin")]
        database: String,
    },
    Actions,
    GeneratePassword,
}

/// `role@db` as typed in the panel's role pickers; bare `role` keeps db empty
/// and the server side fills in the target database.
fn parse_role(spec: &str) -> PermissionSetRef {
    match spec.split_once('@') {
        Some((role, db)) => PermissionSetRef::new(role, db),
        None => PermissionSetRef::new(spec, ""),
    }
}

fn with_session(request: RequestBuilder) -> RequestBuilder {
    let token = fs::read_to_string(SESSION_FILE).unwrap_or_default();
    request.header(header::COOKIE, format!("{}={}", SESSION_COOKIE, token.trim()))
}

/// Pulls the session cookie value out of a Set-Cookie header.
fn session_from_set_cookie(value: &str) -> Option<String> {
    let pair = value.split(';').next()?;
    let (name, token) = pair.split_once('=')?;
    (name.trim() == SESSION_COOKIE).then(|| token.trim().to_string())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = Client::new();

    match cli.command {
        Commands::Login { server_uri, username, password } => {
            let res = client.post(format!("{}/api/auth/login", cli.url))
                .json(&json!({ "serverUri": server_uri, "username": username, "password": password }))
                .send()
                .await?;
            let token = res
                .headers()
                .get_all(header::SET_COOKIE)
                .iter()
                .filter_map(|v| v.to_str().ok())
                .find_map(session_from_set_cookie);
            match token {
                Some(token) if res.status().is_success() => {
                    // Save token
                    fs::write(SESSION_FILE, token)?;
                    println!("Logged in. Session saved to {}", SESSION_FILE);
                }
                _ => println!("Login failed: {}", res.text().await?),
            }
        }
        Commands::Verify => {
            let res = with_session(client.get(format!("{}/api/auth/verify", cli.url)))
                .send()
                .await?;
            println!("Response: {}", res.text().await?);
        }
        Commands::Logout => {
            let res = with_session(client.post(format!("{}/api/auth/logout", cli.url)))
                .send()
                .await?;
            let _ = fs::remove_file(SESSION_FILE);
            println!("Logged out (session removed). {}", res.status());
        }
        Commands::ListUsers => {
            let res = with_session(client.get(format!("{}/api/mongodb/users", cli.url)))
                .send()
                .await?;
            println!("Response: {}", res.text().await?);
        }
        Commands::CreateUser { username, password, generate_password, database, roles } => {
            let password = match (password, generate_password) {
                (Some(password), _) => password,
                (None, true) => {
                    let generated = generate_secure_password();
                    println!("Generated password: {}", generated);
                    generated
                }
                (None, false) => return Err("either --password or --generate-password is required".into()),
            };
            let roles: Vec<PermissionSetRef> = roles.iter().map(|r| parse_role(r)).collect();
            let res = with_session(client.post(format!("{}/api/mongodb/users", cli.url)))
                .json(&json!({
                    "username": username,
                    "password": password,
                    "database": database,
                    "roles": roles,
                }))
                .send()
                .await?;
            println!("Response: {}", res.text().await?);
        }
        Commands::DeleteUser { username, database } => {
            let res = with_session(client.delete(format!("{}/api/mongodb/users", cli.url)))
                .json(&json!({ "username": username, "database": database }))
                .send()
                .await?;
            println!("Response: {}", res.text().await?);
        }
        Commands::GrantRoles { username, database, roles } => {
            let roles: Vec<PermissionSetRef> = roles.iter().map(|r| parse_role(r)).collect();
            let res = with_session(client.post(format!("{}/api/mongodb/grant-roles", cli.url)))
                .json(&json!({ "username": username, "database": database, "roles": roles }))
                .send()
                .await?;
            println!("Response: {}", res.text().await?);
        }
        Commands::RevokeRoles { username, database, roles } => {
            let roles: Vec<PermissionSetRef> = roles.iter().map(|r| parse_role(r)).collect();
            let res = with_session(client.delete(format!("{}/api/mongodb/grant-roles", cli.url)))
                .json(&json!({ "username": username, "database": database, "roles": roles }))
                .send()
                .await?;
            println!("Response: {}", res.text().await?);
        }
        Commands::ListRoles => {
            let res = with_session(client.get(format!("{}/api/mongodb/roles", cli.url)))
                .send()
                .await?;
            println!("Response: {}", res.text().await?);
        }
        Commands::CreateRole { name, database, inherits, grants } => {
            // Assemble locally so a bad grant never leaves the machine
            let mut builder = inherits
                .iter()
                .map(|r| parse_role(r))
                .fold(PermissionSetBuilder::new(&name, &database), PermissionSetBuilder::inherit);
            for spec in &grants {
                let grant: PermissionGrant = spec.parse()?;
                builder.add_grant(grant)?;
            }
            for grant in builder.grants() {
                let actions: Vec<&str> = grant.actions.iter().map(String::as_str).collect();
                println!("  {} [{}] {}", grant.scope.kind(), grant.scope, actions.join(","));
            }
            let definition = builder.build()?;

            let res = with_session(client.post(format!("{}/api/mongodb/roles", cli.url)))
                .json(&json!({
                    "roleName": definition.name,
                    "database": definition.home_database,
                    "privileges": definition.grants,
                    "roles": definition.inherited_sets,
                }))
                .send()
                .await?;
            println!("Response: {}", res.text().await?);
        }
        Commands::DeleteRole { name, database } => {
            let res = with_session(client.delete(format!("{}/api/mongodb/roles", cli.url)))
                .json(&json!({ "roleName": name, "database": database }))
                .send()
                .await?;
            println!("Response: {}", res.text().await?);
        }
        Commands::Actions => {
            let res = client.get(format!("{}/api/mongodb/actions", cli.url))
                .send()
                .await?;
            println!("Response: {}", res.text().await?);
        }
        Commands::GeneratePassword => {
            println!("{}", generate_secure_password());
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_role() {
        assert_eq!(parse_role("read@admin"), PermissionSetRef::new("read", "admin"));
        assert_eq!(parse_role("readWrite"), PermissionSetRef::new("readWrite", ""));
    }

    #[test]
    fn test_session_from_set_cookie() {
        let header = "mongodb_auth=eyJzZXJ2ZXJVcmkiOiJtb25nb2RiOi8vbG9jYWxob3N0In0=; HttpOnly; SameSite=Strict; Path=/; Max-Age=28800";
        assert_eq!(
            session_from_set_cookie(header).as_deref(),
            Some("eyJzZXJ2ZXJVcmkiOiJtb25nb2RiOi8vbG9jYWxob3N0In0=")
        );
        assert_eq!(session_from_set_cookie("other=1; Path=/"), None);
    }
}
