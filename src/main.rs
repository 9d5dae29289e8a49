use std::io::BufRead;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use battleship_link::autopilot::run_match;
use anyhow::bail;
use battleship_link::{
    identity_role, init_logging, role_for_side, ui, AppConfig, Arbiter, Autopilot, Connector,
    HandshakeArbiter, IdentityArbiter, Input, Link, LinkMode, Role, Session, TcpAcceptor,
    TcpInitiator, Transport, TurnState,
};
use clap::{Args, Parser, ValueEnum};
use log::info;
use tokio::sync::mpsc;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum PlayerType {
    Human,
    Auto,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum RoleArg {
    Master,
    Slave,
}

impl From<RoleArg> for Role {
    fn from(role: RoleArg) -> Self {
        match role {
            RoleArg::Master => Role::Master,
            RoleArg::Slave => Role::Slave,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Arbitration {
    /// Exchange ROLE_ANNOUNCEMENTs and require complementary roles.
    Handshake,
    /// Take the role from the link side and only exchange HELLO.
    Identity,
}

#[derive(Args, Clone, Debug)]
struct Common {
    #[arg(long, value_enum, default_value_t = PlayerType::Human)]
    player: PlayerType,
    #[arg(long, help = "Fix RNG seed for reproducible games (e.g., --seed 12345)")]
    seed: Option<u64>,
    /// JSON configuration file.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Show a start screen and wait for Enter before connecting.
    #[arg(long)]
    start_screen: bool,
    #[arg(long, default_value_t = 50)]
    tick_ms: u64,
}

#[derive(Parser)]
enum Commands {
    /// Accept a peer connection.
    Host {
        #[arg(long, default_value = "0.0.0.0:8080")]
        bind: String,
        /// Role to announce (handshake only, default MASTER).
        #[arg(long, value_enum)]
        role: Option<RoleArg>,
        #[arg(long, value_enum, default_value_t = Arbitration::Handshake)]
        arbitration: Arbitration,
        #[command(flatten)]
        common: Common,
    },
    /// Connect to a hosting peer.
    Join {
        #[arg(long, default_value = "127.0.0.1:8080")]
        connect: String,
        /// Role to announce (handshake only, default SLAVE).
        #[arg(long, value_enum)]
        role: Option<RoleArg>,
        #[arg(long, value_enum, default_value_t = Arbitration::Handshake)]
        arbitration: Arbitration,
        #[command(flatten)]
        common: Common,
    },
    /// Pick role and link side from this device's hardware address.
    Device {
        /// This device's address, XX:XX:XX:XX:XX:XX.
        #[arg(long)]
        local: String,
        #[arg(long)]
        device_a: String,
        #[arg(long)]
        device_b: String,
        /// Where to listen when this device accepts.
        #[arg(long, default_value = "0.0.0.0:8080")]
        bind: String,
        /// Network address of device A when this device initiates.
        #[arg(long, default_value = "127.0.0.1:8080")]
        peer: String,
        #[command(flatten)]
        common: Common,
    },
    /// Play two autopilots against each other in-process.
    Local {
        #[arg(long, default_value_t = 1)]
        seed1: u64,
        #[arg(long, default_value_t = 2)]
        seed2: u64,
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<AppConfig> {
    match path {
        Some(path) => {
            let text = std::fs::read_to_string(path)?;
            Ok(AppConfig::from_json(&text)?)
        }
        None => Ok(AppConfig::default()),
    }
}

/// Identity arbitration never negotiates, so its role must come from the
/// link side; a free `--role` could leave both peers MASTER.
fn arbiter(
    kind: Arbitration,
    side: LinkMode,
    role: Option<RoleArg>,
) -> anyhow::Result<Box<dyn Arbiter>> {
    match (kind, role) {
        (Arbitration::Handshake, role) => {
            let role = role.map_or_else(|| role_for_side(side), Role::from);
            Ok(Box::new(HandshakeArbiter::new(role)))
        }
        (Arbitration::Identity, None) => Ok(Box::new(IdentityArbiter::for_side(side))),
        (Arbitration::Identity, Some(_)) => {
            bail!("--role requires --arbitration handshake")
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();
    let cli = Cli::parse();

    match cli.command {
        Commands::Host {
            bind,
            role,
            arbitration,
            common,
        } => {
            let arbiter = arbiter(arbitration, LinkMode::Server, role)?;
            let acceptor = TcpAcceptor::bind(&bind).await?;
            println!("Waiting for a player on {}...", acceptor.local_addr());
            play(Arc::new(acceptor), arbiter, common).await
        }
        Commands::Join {
            connect,
            role,
            arbitration,
            common,
        } => {
            let arbiter = arbiter(arbitration, LinkMode::Client, role)?;
            println!("Connecting to {}...", connect);
            let initiator = TcpInitiator::new(connect);
            play(Arc::new(initiator), arbiter, common).await
        }
        Commands::Device {
            local,
            device_a,
            device_b,
            bind,
            peer,
            common,
        } => {
            let identity = identity_role(&local, &device_a, &device_b);
            info!(
                "device {} is {} ({:?}, target {:?})",
                local, identity.role, identity.mode, identity.target
            );
            let arbiter = Box::new(IdentityArbiter::from(&identity));
            match identity.mode {
                LinkMode::Client => play(Arc::new(TcpInitiator::new(peer)), arbiter, common).await,
                LinkMode::Server | LinkMode::None => {
                    let acceptor = TcpAcceptor::bind(&bind).await?;
                    play(Arc::new(acceptor), arbiter, common).await
                }
            }
        }
        Commands::Local {
            seed1,
            seed2,
            config,
        } => {
            let config = load_config(config.as_ref())?;
            println!("Starting local autopilot game...");
            let report = run_match(
                (seed1, seed2),
                &config.session,
                Duration::from_millis(100),
                100_000,
            );
            println!(
                "MASTER: {:?} after {} shots, SLAVE: {:?} after {} shots ({} ticks)",
                report.master, report.master_shots, report.slave, report.slave_shots, report.ticks
            );
            match report.winner() {
                Some(role) => println!("{} wins.", role),
                None => println!("No winner."),
            }
            Ok(())
        }
    }
}

enum Command {
    Input(Input),
    Reset,
    Continue,
    Exit,
}

/// Forward stdin key presses to the tick loop. A blocking thread keeps the
/// main loop free of terminal reads.
fn spawn_keyboard(exit_on_eof: bool) -> mpsc::UnboundedReceiver<Command> {
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            if line.trim().is_empty() && tx.send(Command::Continue).is_err() {
                return;
            }
            for key in line.chars() {
                let command = match key.to_ascii_lowercase() {
                    'd' => Command::Input(Input::MoveRight),
                    's' => Command::Input(Input::MoveDown),
                    'r' => Command::Input(Input::Rotate),
                    'f' => Command::Input(Input::Confirm),
                    'q' => Command::Reset,
                    'x' => Command::Exit,
                    _ => continue,
                };
                if tx.send(command).is_err() {
                    return;
                }
            }
        }
        if exit_on_eof {
            let _ = tx.send(Command::Exit);
        }
    });
    rx
}

async fn play(
    connector: Arc<dyn Connector>,
    arbiter: Box<dyn Arbiter>,
    common: Common,
) -> anyhow::Result<()> {
    let mut config = load_config(common.config.as_ref())?;
    config.session.start_screen |= common.start_screen;
    let link = Link::new(connector, config.link.clone())?;
    let grace = config.link.close_grace();
    let session = Session::new(link, arbiter, config.session);

    if let Some(s) = common.seed {
        println!("Using fixed seed: {} (game will be reproducible)", s);
    }
    let pilot = match (common.player, common.seed) {
        (PlayerType::Human, _) => None,
        (PlayerType::Auto, Some(seed)) => Some(Autopilot::seeded(seed)),
        (PlayerType::Auto, None) => Some(Autopilot::from_entropy()),
    };
    if pilot.is_none() {
        println!("{}", ui::HELP);
    }
    let tick = Duration::from_millis(common.tick_ms.max(1));
    run_loop(session, pilot, tick, grace).await
}

async fn run_loop<T: Transport>(
    mut session: Session<T>,
    mut pilot: Option<Autopilot<rand::rngs::SmallRng>>,
    tick: Duration,
    grace: Duration,
) -> anyhow::Result<()> {
    let mut keys = spawn_keyboard(pilot.is_none());
    let mut ticker = tokio::time::interval(tick);
    let mut last_frame = String::new();
    loop {
        ticker.tick().await;
        let now = Instant::now();
        let mut inputs = Vec::new();
        while let Ok(command) = keys.try_recv() {
            match command {
                Command::Input(input) => inputs.push(input),
                Command::Reset => session.request_reset(now),
                Command::Continue => {
                    if !session.start() {
                        session.acknowledge(now);
                    }
                }
                Command::Exit => {
                    session.shutdown(now);
                    // Give the writer task time to flush DISCONNECT.
                    tokio::time::sleep(grace).await;
                    return Ok(());
                }
            }
        }
        if let Some(pilot) = pilot.as_mut() {
            if session.state() == TurnState::StartScreen {
                session.start();
            }
            inputs.extend(pilot.next_inputs(&session.snapshot(now)));
        }

        session.tick(now, &inputs);

        let frame = ui::render(&session.snapshot(now));
        if frame != last_frame {
            println!("{}", frame);
            last_frame = frame;
        }
        if pilot.is_some() && session.state() == TurnState::Ended {
            println!("Game over.");
            return Ok(());
        }
    }
}
