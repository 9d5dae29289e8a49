use std::sync::Arc;
use std::time::{Duration, Instant};

use battleship_link::{
    Coord, Envelope, HandshakeArbiter, Link, LinkConfig, LinkEvent, LinkMode, LinkStatus, Message,
    Role, Session, SessionConfig, TcpAcceptor, TcpInitiator, Transport, TurnState,
};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::sleep;

fn fast_link() -> LinkConfig {
    LinkConfig {
        connect_retry_ms: 50,
        close_grace_ms: 200,
        ..LinkConfig::default()
    }
}

async fn wait_for<F: FnMut() -> bool>(mut ready: F) -> bool {
    for _ in 0..200 {
        if ready() {
            return true;
        }
        sleep(Duration::from_millis(10)).await;
    }
    false
}

async fn recv<T: Transport>(link: &mut T) -> Option<Envelope> {
    for _ in 0..200 {
        if let Some(env) = link.try_receive() {
            return Some(env);
        }
        sleep(Duration::from_millis(10)).await;
    }
    None
}

#[tokio::test(flavor = "multi_thread")]
async fn test_links_connect_and_exchange() -> anyhow::Result<()> {
    let acceptor = TcpAcceptor::bind("127.0.0.1:0").await?;
    let addr = acceptor.local_addr();
    let mut server = Link::new(Arc::new(acceptor), fast_link())?;
    let mut client = Link::new(Arc::new(TcpInitiator::new(addr.to_string())), fast_link())?;
    server.open();
    client.open();

    assert!(wait_for(|| server.status() == LinkStatus::Connected).await);
    assert!(wait_for(|| client.status() == LinkStatus::Connected).await);
    assert_eq!(server.mode(), LinkMode::Server);
    assert_eq!(client.mode(), LinkMode::Client);

    assert_eq!(client.send(Message::Hello), Some(0));
    let shot = Message::Shot {
        coord: Coord::new(3, 1),
    };
    assert_eq!(client.send(shot), Some(1));
    assert_eq!(recv(&mut server).await.map(|e| e.message), Some(Message::Hello));
    let env = recv(&mut server).await.unwrap();
    assert_eq!((env.message, env.seq), (shot, 1));

    client.close();
    server.close();
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn test_partial_and_malformed_frames() -> anyhow::Result<()> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let mut link = Link::new(Arc::new(TcpInitiator::new(addr.to_string())), fast_link())?;
    link.open();
    let (mut socket, _) = listener.accept().await?;

    socket.write_all(b"{\"type\": \"SHOT\", \"coo").await?;
    socket.flush().await?;
    sleep(Duration::from_millis(50)).await;
    assert!(link.try_receive().is_none());
    socket
        .write_all(b"rd\": [2, 4], \"seq\": 0}\ngarbage\n{\"type\": \"FOO\", \"seq\": 1}\n")
        .await?;
    socket
        .write_all(b"{\"type\": \"READY_TO_START\", \"seq\": 2}\n")
        .await?;

    let env = recv(&mut link).await.unwrap();
    assert_eq!(
        env.message,
        Message::Shot {
            coord: Coord::new(2, 4)
        }
    );
    let env = recv(&mut link).await.unwrap();
    assert_eq!((env.message, env.seq), (Message::ReadyToStart, 2));
    assert!(link.try_receive().is_none());
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn test_disconnect_message_becomes_event() -> anyhow::Result<()> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let mut link = Link::new(Arc::new(TcpInitiator::new(addr.to_string())), fast_link())?;
    link.open();
    let (mut socket, _) = listener.accept().await?;
    socket
        .write_all(b"{\"type\": \"DISCONNECT\", \"seq\": 5}\n")
        .await?;

    let mut event = None;
    assert!(
        wait_for(|| {
            event = link.take_event();
            event.is_some()
        })
        .await
    );
    assert_eq!(event, Some(LinkEvent::PeerDisconnected));
    assert!(link.try_receive().is_none());
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn test_peer_drop_reports_lost_and_stops_sending() -> anyhow::Result<()> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let mut link = Link::new(Arc::new(TcpInitiator::new(addr.to_string())), fast_link())?;
    link.open();
    let (socket, _) = listener.accept().await?;
    assert!(wait_for(|| link.status() == LinkStatus::Connected).await);
    drop(socket);

    let mut event = None;
    assert!(
        wait_for(|| {
            event = link.take_event();
            event.is_some()
        })
        .await
    );
    assert_eq!(event, Some(LinkEvent::Lost));
    assert_eq!(link.status(), LinkStatus::Disconnected);
    assert_eq!(link.send(Message::Hello), None);
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn test_initiator_retries_until_listener_appears() -> anyhow::Result<()> {
    // Reserve a port, then free it so the first attempts are refused.
    let addr = TcpListener::bind("127.0.0.1:0").await?.local_addr()?;
    let mut link = Link::new(Arc::new(TcpInitiator::new(addr.to_string())), fast_link())?;
    link.open();
    sleep(Duration::from_millis(120)).await;
    assert_ne!(link.status(), LinkStatus::Connected);
    assert_eq!(link.send(Message::Hello), None);

    let listener = TcpListener::bind(addr).await?;
    let (socket, _) = listener.accept().await?;
    assert!(wait_for(|| link.status() == LinkStatus::Connected).await);

    link.send(Message::ShipsPlaced);
    let mut lines = BufReader::new(socket).lines();
    let line = lines.next_line().await?.unwrap();
    let value: serde_json::Value = serde_json::from_str(&line)?;
    assert_eq!(value["type"], "SHIPS_PLACED");
    assert_eq!(value["seq"], 0);
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn test_close_flushes_disconnect() -> anyhow::Result<()> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let mut link = Link::new(Arc::new(TcpInitiator::new(addr.to_string())), fast_link())?;
    link.open();
    let (socket, _) = listener.accept().await?;
    assert!(wait_for(|| link.status() == LinkStatus::Connected).await);

    link.send(Message::Disconnect);
    link.close();
    assert_eq!(link.status(), LinkStatus::Disconnected);

    let mut lines = BufReader::new(socket).lines();
    let line = lines.next_line().await?.unwrap();
    assert!(line.contains("\"DISCONNECT\""));
    assert!(lines.next_line().await?.is_none());
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn test_acceptor_serves_a_new_connection_after_reset() -> anyhow::Result<()> {
    let acceptor = TcpAcceptor::bind("127.0.0.1:0").await?;
    let addr = acceptor.local_addr();
    let mut link = Link::new(Arc::new(acceptor), fast_link())?;
    link.open();

    let first = TcpStream::connect(addr).await?;
    assert!(wait_for(|| link.status() == LinkStatus::Connected).await);
    drop(first);
    assert!(wait_for(|| link.take_event() == Some(LinkEvent::Lost)).await);

    link.open();
    let mut second = TcpStream::connect(addr).await?;
    assert!(wait_for(|| link.status() == LinkStatus::Connected).await);
    second
        .write_all(b"{\"type\": \"HELLO\", \"seq\": 0}\n")
        .await?;
    assert_eq!(recv(&mut link).await.map(|e| e.message), Some(Message::Hello));
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn test_sessions_handshake_over_tcp() -> anyhow::Result<()> {
    let acceptor = TcpAcceptor::bind("127.0.0.1:0").await?;
    let addr = acceptor.local_addr();
    let server = Link::new(Arc::new(acceptor), fast_link())?;
    let client = Link::new(Arc::new(TcpInitiator::new(addr.to_string())), fast_link())?;
    let mut master = Session::new(
        server,
        Box::new(HandshakeArbiter::new(Role::Master)),
        SessionConfig::default(),
    );
    let mut slave = Session::new(
        client,
        Box::new(HandshakeArbiter::new(Role::Slave)),
        SessionConfig::default(),
    );

    let mut reached = false;
    for _ in 0..300 {
        let now = Instant::now();
        master.tick(now, &[]);
        slave.tick(now, &[]);
        if master.state() == TurnState::PlacingShips && slave.state() == TurnState::PlacingShips {
            reached = true;
            break;
        }
        sleep(Duration::from_millis(10)).await;
    }
    assert!(reached);
    assert_eq!(master.role(), Some(Role::Master));
    assert_eq!(slave.role(), Some(Role::Slave));
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn test_session_shutdown_flushes_disconnect_without_reconnecting() -> anyhow::Result<()> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let link = Link::new(Arc::new(TcpInitiator::new(addr.to_string())), fast_link())?;
    let mut session = Session::new(
        link,
        Box::new(HandshakeArbiter::new(Role::Slave)),
        SessionConfig::default(),
    );
    let (socket, _) = listener.accept().await?;
    assert!(wait_for(|| session.transport().status() == LinkStatus::Connected).await);

    session.shutdown(Instant::now());
    assert_eq!(session.state(), TurnState::StartScreen);
    assert_eq!(session.transport().status(), LinkStatus::Disconnected);

    let mut lines = BufReader::new(socket).lines();
    let line = lines.next_line().await?.unwrap();
    assert!(line.contains("\"DISCONNECT\""));
    assert!(lines.next_line().await?.is_none());

    // No fresh connection attempt follows.
    let retry = tokio::time::timeout(Duration::from_millis(200), listener.accept()).await;
    assert!(retry.is_err());
    Ok(())
}
