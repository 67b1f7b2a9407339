//! storcon - storage agent console

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};

use storcon_agent::{AgentClient, TlsCredentials, DEFAULT_AGENT_PORT};
use storcon_wire::{FunctionCall, Variable};

#[derive(Parser)]
#[command(name = "storcon")]
#[command(author, version, about = "Manage remote storage agents")]
struct Cli {
    /// Agent host to talk to
    #[arg(short = 'H', long)]
    host: String,

    /// Agent port
    #[arg(long, default_value_t = DEFAULT_AGENT_PORT)]
    port: u16,

    /// Client certificate (PEM)
    #[arg(long, default_value = "certs/client-cert.pem")]
    cert: PathBuf,

    /// Client private key (PEM)
    #[arg(long, default_value = "certs/client-key.pem")]
    key: PathBuf,

    /// CA bundle to verify the agent against (default: accept any peer
    /// certificate; agents are self-signed)
    #[arg(long)]
    ca: Option<PathBuf>,

    /// Connect/read timeout in seconds
    #[arg(long, default_value_t = 30)]
    timeout: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check whether the agent already trusts this client's certificate
    AuthCheck,

    /// Offer a password to the agent, then re-check authentication
    Authenticate {
        /// The agent's root password
        #[arg(long)]
        password: String,
    },

    /// Invoke a remote function and print the response variables
    Call {
        /// Remote function name (e.g. get_mapper_ids)
        name: String,

        /// Arguments as name=value (string), or name:int=5, name:bool=true,
        /// name:float=1.5 for other kinds; repeatable
        #[arg(short, long = "arg")]
        args: Vec<String>,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let mut credentials = TlsCredentials::new(&cli.cert, &cli.key);
    if let Some(ca) = &cli.ca {
        credentials = credentials.with_ca_bundle(ca);
    }
    let client = AgentClient::new(&cli.host, credentials)
        .with_port(cli.port)
        .with_timeout(Duration::from_secs(cli.timeout));

    match cli.command {
        Commands::AuthCheck => auth_check(&client).await,
        Commands::Authenticate { password } => authenticate(&client, &password).await,
        Commands::Call { name, args } => call(&client, &name, &args).await,
    }
}

async fn auth_check(client: &AgentClient) -> Result<()> {
    let authed = client
        .auth_check()
        .await
        .with_context(|| format!("no usable agent on {}", client.host()))?;
    println!(
        "{}: {}",
        client.host(),
        if authed { "authenticated" } else { "not authenticated" }
    );
    Ok(())
}

async fn authenticate(client: &AgentClient, password: &str) -> Result<()> {
    client
        .authenticate(password)
        .await
        .with_context(|| format!("no usable agent on {}", client.host()))?;

    // The agent never answers the authenticate request; a fresh connection's
    // hello is the only way to learn the outcome.
    if client.auth_check().await? {
        println!("{}: authenticated", client.host());
        Ok(())
    } else {
        bail!("{} rejected the password", client.host());
    }
}

async fn call(client: &AgentClient, name: &str, args: &[String]) -> Result<()> {
    let mut function_call = FunctionCall::new(name);
    for raw in args {
        function_call = function_call.arg(parse_arg(raw)?);
    }

    let response = client
        .call(&function_call)
        .await
        .with_context(|| format!("call to {name} on {} failed", client.host()))?;
    response.require_success()?;

    for var in response.iter() {
        println!("{} ({}) = {}", var.name(), var.kind(), var.payload());
    }
    Ok(())
}

/// Parse `name=value`, `name:int=5`, `name:bool=true`, `name:float=1.5`
/// into an argument variable.
fn parse_arg(raw: &str) -> Result<Variable> {
    let (lhs, value) = raw
        .split_once('=')
        .with_context(|| format!("argument {raw:?} is not name=value"))?;

    let (name, kind) = match lhs.split_once(':') {
        Some((name, kind)) => (name, kind),
        None => (lhs, "string"),
    };
    if name.is_empty() {
        bail!("argument {raw:?} has an empty name");
    }

    let var = match kind {
        "string" => Variable::new(name, value),
        "int" => Variable::new(
            name,
            value
                .parse::<i64>()
                .with_context(|| format!("argument {name}: {value:?} is not an integer"))?,
        ),
        "bool" => Variable::new(
            name,
            value
                .parse::<bool>()
                .with_context(|| format!("argument {name}: {value:?} is not a boolean"))?,
        ),
        "float" => Variable::new(
            name,
            value
                .parse::<f64>()
                .with_context(|| format!("argument {name}: {value:?} is not a number"))?,
        ),
        other => bail!("argument {name}: unknown kind {other:?}"),
    };
    Ok(var)
}

#[cfg(test)]
mod tests {
    use super::*;
    use storcon_wire::VarKind;

    #[test]
    fn parse_arg_kinds() {
        assert_eq!(parse_arg("label=data").unwrap().kind(), VarKind::Str);
        let int = parse_arg("size:int=512").unwrap();
        assert_eq!(int.kind(), VarKind::Int);
        assert_eq!(int.payload().as_int(), Some(512));
        assert_eq!(
            parse_arg("force:bool=true").unwrap().payload().as_bool(),
            Some(true)
        );
        assert_eq!(parse_arg("ratio:float=0.5").unwrap().kind(), VarKind::Float);
    }

    #[test]
    fn parse_arg_rejects_bad_input() {
        assert!(parse_arg("no-equals").is_err());
        assert!(parse_arg("size:int=abc").is_err());
        assert!(parse_arg("x:unknown=1").is_err());
        assert!(parse_arg(":int=1").is_err());
    }
}
