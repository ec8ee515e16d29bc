//! Ende-zu-Ende-Tests der Sitzungsschicht ueber echte Loopback-Verbindungen

use neuwelt_core::NationId;
use neuwelt_protocol::messages::{
    LoginMessage, LogoutMessage, LogoutReason, Message, RequestLaunchMessage, TypedMessage,
};
use neuwelt_protocol::wire::FrameCodec;
use neuwelt_protocol::{Connection, Envelope, ProtocolError};
use neuwelt_session::{
    Game, NoAdvertiser, RoundRobinRules, ServerPlayer, SessionConfig, SessionServer, SessionState,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::sync::watch;

const FRIST: Duration = Duration::from_secs(5);
const STILLE: Duration = Duration::from_millis(200);

struct Testserver {
    state: Arc<SessionState<RoundRobinRules>>,
    addr: SocketAddr,
    _shutdown: watch::Sender<bool>,
}

/// Log-Ausgabe der Tests; Filter ueber `RUST_LOG`
fn logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

async fn server_starten(config: SessionConfig) -> Testserver {
    logging();
    let state = SessionState::neu(config, RoundRobinRules, Arc::new(NoAdvertiser));
    let server = SessionServer::binden(Arc::clone(&state), "127.0.0.1:0".parse().unwrap())
        .await
        .unwrap();
    let addr = server.local_addr().unwrap();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(server.starten(shutdown_rx));
    Testserver {
        state,
        addr,
        _shutdown: shutdown_tx,
    }
}

async fn mit_spiel() -> Testserver {
    let t = server_starten(SessionConfig::default()).await;
    t.state.neues_spiel_anlegen().unwrap();
    t
}

async fn beitreten(t: &Testserver, name: &str) -> (Connection, LoginMessage) {
    let mut conn = Connection::connect(t.addr).await.unwrap();
    let anfrage = LoginMessage::request(name, t.state.config.version.clone(), false);
    let antwort = conn.ask(&anfrage.to_envelope(), FRIST).await.unwrap();
    let login = LoginMessage::from_envelope(&antwort).expect("Login-Antwort erwartet");
    (conn, login)
}

async fn fehler_erwarten(conn: &mut Connection, message_id: &str) {
    let env = conn.receive_timeout(FRIST).await.unwrap();
    match Message::from_envelope(&env).unwrap() {
        Message::Error(e) => assert_eq!(e.message_id, message_id),
        andere => panic!("Fehler erwartet, bekommen: {}", andere.tag()),
    }
}

async fn stille_erwarten(conn: &mut Connection) {
    assert!(matches!(
        conn.receive_timeout(STILLE).await,
        Err(ProtocolError::Timeout)
    ));
}

#[tokio::test]
async fn beitritt_meldet_nur_den_anderen() {
    let t = mit_spiel().await;

    let (mut p1, login1) = beitreten(&t, "P1").await;
    assert!(login1.current_player);
    assert!(login1.game.is_some());

    let (mut p2, login2) = beitreten(&t, "P2").await;
    assert!(!login2.current_player);
    let meldung = p1.receive_timeout(FRIST).await.unwrap();
    assert_eq!(meldung.tag(), "addPlayer");

    let (mut p3, _) = beitreten(&t, "P3").await;
    assert_eq!(p1.receive_timeout(FRIST).await.unwrap().tag(), "addPlayer");
    assert_eq!(p2.receive_timeout(FRIST).await.unwrap().tag(), "addPlayer");
    stille_erwarten(&mut p3).await;
}

#[tokio::test]
async fn falsche_version_wird_abgelehnt_verbindung_bleibt() {
    let t = mit_spiel().await;
    let mut conn = Connection::connect(t.addr).await.unwrap();

    let falsch = LoginMessage::request("Bob", "0.0.0-alt", false);
    conn.send(&falsch.to_envelope()).await.unwrap();
    fehler_erwarten(&mut conn, "server.wrongVersion").await;
    assert!(t.state.lock().game.as_ref().unwrap().players().is_empty());

    // Derselbe Client darf es mit der richtigen Version erneut versuchen
    let richtig = LoginMessage::request("Bob", t.state.config.version.clone(), false);
    let antwort = conn.ask(&richtig.to_envelope(), FRIST).await.unwrap();
    assert_eq!(antwort.tag(), "login");
}

#[tokio::test]
async fn ohne_spiel_laeuft_die_frist_ab() {
    let config = SessionConfig {
        login_timeout: Duration::from_millis(100),
        ..SessionConfig::default()
    };
    let t = server_starten(config).await;
    let mut conn = Connection::connect(t.addr).await.unwrap();
    let anfrage = LoginMessage::request("Alice", t.state.config.version.clone(), false);
    conn.send(&anfrage.to_envelope()).await.unwrap();
    fehler_erwarten(&mut conn, "server.timeOut").await;
    assert!(t.state.lock().game.is_none());
}

#[tokio::test]
async fn login_wartet_auf_das_spiel() {
    let t = server_starten(SessionConfig::default()).await;
    let mut conn = Connection::connect(t.addr).await.unwrap();
    let anfrage = LoginMessage::request("Alice", t.state.config.version.clone(), false);
    conn.send(&anfrage.to_envelope()).await.unwrap();

    tokio::time::sleep(Duration::from_millis(50)).await;
    t.state.neues_spiel_anlegen().unwrap();
    assert_eq!(conn.receive_timeout(FRIST).await.unwrap().tag(), "login");
}

#[tokio::test]
async fn wiederbeitritt_uebernimmt_ki_spieler() {
    let t = server_starten(SessionConfig::default()).await;
    let mut game = Game::neu(["dutch", "english"].map(NationId::new));
    let mut bob = ServerPlayer::ki("Bob", NationId::new("english"));
    bob.ai = false;
    game.add_player(ServerPlayer::ki("Alice", NationId::new("dutch")));
    game.add_player(bob);
    t.state.install_saved_game(game).unwrap();

    let (mut bob_conn, _) = beitreten(&t, "Bob").await;
    let (_alice_conn, antwort) = beitreten(&t, "Alice").await;
    assert!(antwort.start_game);

    // Bob erfaehrt, dass Alice nicht mehr von der KI gesteuert wird
    let meldung = bob_conn.receive_timeout(FRIST).await.unwrap();
    assert_eq!(meldung.tag(), "setAI");
    assert_eq!(meldung.attribute("ai"), Some("false"));

    // Ein zweiter Client mit demselben Namen scheitert
    let mut zweiter = Connection::connect(t.addr).await.unwrap();
    let anfrage = LoginMessage::request("Alice", t.state.config.version.clone(), false);
    zweiter.send(&anfrage.to_envelope()).await.unwrap();
    fehler_erwarten(&mut zweiter, "server.userNameInUse").await;
}

#[tokio::test]
async fn trennung_wird_den_anderen_gemeldet() {
    let t = mit_spiel().await;
    let (mut p1, _) = beitreten(&t, "P1").await;
    let (mut p2, _) = beitreten(&t, "P2").await;
    assert_eq!(p1.receive_timeout(FRIST).await.unwrap().tag(), "addPlayer");

    p2.disconnect().await;
    let meldung = p1.receive_timeout(FRIST).await.unwrap();
    let logout = LogoutMessage::from_envelope(&meldung).unwrap();
    assert_eq!(logout.reason, LogoutReason::Disconnected);
}

/// Wartet, bis die Aufstellung `anzahl` Spieler enthaelt
async fn spieler_anzahl_erwarten(t: &Testserver, anzahl: usize) {
    let ende = tokio::time::Instant::now() + FRIST;
    loop {
        let aktuell = t.state.lock().game.as_ref().map_or(0, |g| g.players().len());
        if aktuell == anzahl {
            return;
        }
        assert!(tokio::time::Instant::now() < ende, "{aktuell} statt {anzahl} Spieler");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

#[tokio::test]
async fn wiederholter_beitritt_in_der_aufstellung_belegt_keine_nation() {
    let t = mit_spiel().await;
    let nationen = t.state.config.nations.len();

    for _ in 0..nationen {
        let (mut alice, _) = beitreten(&t, "Alice").await;
        spieler_anzahl_erwarten(&t, 1).await;
        alice.disconnect().await;
        spieler_anzahl_erwarten(&t, 0).await;
    }

    let (_bob, login) = beitreten(&t, "Bob").await;
    assert_eq!(login.user_name, "Bob");
    let core = t.state.lock();
    let game = core.game.as_ref().unwrap();
    assert_eq!(game.players().len(), 1);
    assert_eq!(game.freie_plaetze(), nationen - 1);
    assert!(game.players()[0].admin);
}

#[tokio::test]
async fn kaputte_payload_laesst_verbindung_offen() {
    let t = mit_spiel().await;
    let mut roh = TcpStream::connect(t.addr).await.unwrap();
    roh.write_all(&[0, 0, 0, 3, b'{', b'{', b'{']).await.unwrap();

    let mut conn = Connection::from_stream(roh, FrameCodec::new()).unwrap();
    fehler_erwarten(&mut conn, "server.malformedMessage").await;

    conn.send(&Envelope::new("teleport")).await.unwrap();
    fehler_erwarten(&mut conn, "server.unsupportedMessage").await;
    assert!(conn.is_connected());
}

#[tokio::test]
async fn start_durch_admin_und_spielende() {
    let t = mit_spiel().await;
    let (mut admin, _) = beitreten(&t, "Admin").await;
    let (mut gast, _) = beitreten(&t, "Gast").await;
    assert_eq!(admin.receive_timeout(FRIST).await.unwrap().tag(), "addPlayer");

    // Gast darf nicht starten
    gast.send(&RequestLaunchMessage.to_envelope()).await.unwrap();
    fehler_erwarten(&mut gast, "server.notAdmin").await;

    admin.send(&RequestLaunchMessage.to_envelope()).await.unwrap();
    assert_eq!(admin.receive_timeout(FRIST).await.unwrap().tag(), "startGame");
    assert_eq!(gast.receive_timeout(FRIST).await.unwrap().tag(), "startGame");

    // Admin verlaesst die Mehrspieler-Partie: Spielende fuer alle
    let admin_id = t.state.lock().game.as_ref().unwrap().players()[0].id;
    let logout = LogoutMessage::new(admin_id, LogoutReason::Quit);
    admin.send(&logout.to_envelope()).await.unwrap();
    assert_eq!(gast.receive_timeout(FRIST).await.unwrap().tag(), "gameEnded");

    // Im Endzustand werden Logins abgelehnt
    let mut spaeter = Connection::connect(t.addr).await.unwrap();
    let anfrage = LoginMessage::request("Zoe", t.state.config.version.clone(), false);
    spaeter.send(&anfrage.to_envelope()).await.unwrap();
    fehler_erwarten(&mut spaeter, "server.badState").await;
}
