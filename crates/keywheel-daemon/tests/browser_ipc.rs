mod common;

use common::{tags, titles, CountingClock, Fixture};
use keywheel_daemon::host::{spawn_line_reader, HostCommand, HostSession};
use keywheel_daemon::ipc::ChannelState;
use keywheel_proto::protocol::{Cell, Column, Quit, UiMessage};
use std::collections::BTreeMap;
use std::os::unix::net::UnixDatagram;

fn house_set() -> Fixture {
    Fixture::new(&[
        tags("Opener", Some(100.0), "Am"),
        tags("Too Fast", Some(120.0), "Am"),
        tags("Relative", Some(101.0), "C"),
        tags("Neighbour", Some(99.0), "Em"),
        tags("Clash", Some(100.0), "F#m"),
        tags("Untagged", None, "Am"),
    ])
}

#[test]
fn peer_gets_snapshot_on_startup() {
    let fixture = house_set();
    let peer = fixture.peer();
    let clock = CountingClock::default();
    let (service, _dir) = fixture.start(&clock);

    assert_eq!(clock.sleeps.get(), 0);
    assert_eq!(service.channel_state(), ChannelState::Active);

    let snap = peer.recv_snapshot();
    assert_eq!(snap.sel_ix, 0);
    assert_eq!(snap.cols, Column::ALL.to_vec());
    assert_eq!(titles(&snap), vec!["Opener", "Relative", "Neighbour", "Clash"]);
    assert!(snap.playing.is_empty());
    assert!(snap.bpm_filter);
    assert!(snap.key_filter);
    assert_eq!(snap.bpm_percent, 5.0);

    let row = &snap.rows[0];
    assert_eq!(row[0], Cell::Text("Various".into()));
    assert_eq!(row[3], Cell::Text("5:00".into()));
    assert_eq!(row[4], Cell::Number(100.0));
    assert_eq!(row[5], Cell::Text("1m / Am".into()));
    assert_eq!(row[6], Cell::Int(-1));
    assert_eq!(peer.drain(), 0);
}

#[test]
fn each_scroll_sends_one_snapshot() {
    let fixture = house_set();
    let peer = fixture.peer();
    let (mut service, _dir) = fixture.start(&CountingClock::default());
    peer.recv_snapshot();

    service.scroll_vertical(true);
    assert_eq!(peer.recv_snapshot().sel_ix, 1);
    assert_eq!(peer.drain(), 0);

    for _ in 0..10 {
        service.scroll_vertical(true);
    }
    assert_eq!(peer.drain(), 10);
    assert_eq!(service.selection().index(), 3);

    service.scroll_horizontal(true);
    service.scroll_horizontal(false);
    assert_eq!(peer.drain(), 0);
}

#[test]
fn redundant_command_sends_nothing() {
    let fixture = house_set();
    let peer = fixture.peer();
    let (mut service, _dir) = fixture.start(&CountingClock::default());
    peer.recv_snapshot();

    peer.send(br#"{"bpm_filter": true, "key_filter": true}"#);
    assert!(!service.poll());
    assert_eq!(peer.drain(), 0);

    peer.send(br#"{"bpm_filter": false}"#);
    assert!(service.poll());
    let snap = peer.recv_snapshot();
    assert!(!snap.bpm_filter);
    assert_eq!(snap.rows.len(), 6);
    assert_eq!(peer.drain(), 0);
}

#[test]
fn malformed_command_is_dropped() {
    let fixture = house_set();
    let peer = fixture.peer();
    let (mut service, _dir) = fixture.start(&CountingClock::default());
    peer.recv_snapshot();

    peer.send(b"\xff\xfe not json");
    assert!(!service.poll());
    peer.send(br#"{"bpm_percent": 25}"#);
    assert!(service.poll());
    let snap = peer.recv_snapshot();
    assert_eq!(snap.bpm_percent, 25.0);
    assert_eq!(titles(&snap).len(), 5);
}

#[test]
fn selection_follows_record_when_tolerance_shrinks() {
    let mut fixture = Fixture::new(&[
        tags("a", Some(90.0), "Am"),
        tags("b", Some(109.0), "Am"),
        tags("c", Some(100.0), "Am"),
        tags("d", Some(101.0), "Am"),
        tags("e", Some(130.0), "Am"),
    ]);
    fixture.config.filter.bpm_tolerance_percent = 12.0;
    let peer = fixture.peer();
    let (mut service, _dir) = fixture.start(&CountingClock::default());
    assert_eq!(titles(&peer.recv_snapshot()), vec!["a", "b", "c", "d"]);

    for _ in 0..3 {
        service.scroll_vertical(true);
    }
    assert_eq!(peer.drain(), 3);

    peer.send(br#"{"bpm_percent": 5}"#);
    assert!(service.poll());
    let snap = peer.recv_snapshot();
    assert_eq!(titles(&snap), vec!["c", "d"]);
    assert_eq!(snap.sel_ix, 1);
}

#[test]
fn selection_resets_when_record_filtered_out() {
    let fixture = house_set();
    let peer = fixture.peer();
    let (mut service, _dir) = fixture.start(&CountingClock::default());
    peer.recv_snapshot();

    service.scroll_vertical(true);
    assert_eq!(peer.recv_snapshot().sel_ix, 1);

    // "Relative" is at 101 BPM; a 120 anchor drops it.
    service.set_tempo(120.0);
    let snap = peer.recv_snapshot();
    assert_eq!(titles(&snap), vec!["Too Fast"]);
    assert_eq!(snap.sel_ix, 0);
}

#[test]
fn playing_deck_ranks_catalog_by_key() {
    let fixture = house_set();
    let deck_file = fixture.track_path(0);
    let peer = fixture.peer();
    let (service, _dir) = fixture.start(&CountingClock::default());
    peer.recv_snapshot();

    let mut session = HostSession::new(service);
    assert!(session.handle(HostCommand::Deck(2, deck_file)));

    let snap = peer.recv_snapshot();
    assert_eq!(titles(&snap), vec!["Opener", "Relative", "Neighbour"]);
    let distances: Vec<&Cell> = snap.rows.iter().map(|r| &r[6]).collect();
    assert_eq!(distances, vec![&Cell::Int(0), &Cell::Int(3), &Cell::Int(1)]);

    let deck = &snap.playing[&2];
    assert_eq!(deck[1], Cell::Text("Opener".into()));
    assert_eq!(deck[6], Cell::Int(0));

    assert!(session.handle(HostCommand::Eject(2)));
    let snap = peer.recv_snapshot();
    assert!(snap.playing.is_empty());
    assert_eq!(titles(&snap).len(), 4);

    // Ejecting an empty deck changes nothing.
    assert!(session.handle(HostCommand::Eject(2)));
    assert_eq!(peer.drain(), 0);

    assert!(!session.handle(HostCommand::Quit));
}

#[test]
fn lowest_deck_sets_the_reference() {
    let fixture = house_set();
    let deck_a = fixture.track_path(0);
    let deck_c = fixture.track_path(2);
    let peer = fixture.peer();
    let (mut service, _dir) = fixture.start(&CountingClock::default());
    peer.recv_snapshot();

    service.set_playing_tracks(BTreeMap::from([(3, deck_a), (1, deck_c)]));
    let snap = peer.recv_snapshot();
    assert_eq!(service.playing().reference_key(), Some("1d"));
    assert_eq!(snap.playing[&1][6], Cell::Int(0));
    assert_eq!(snap.playing[&3][6], Cell::Int(3));
}

#[test]
fn disconnect_sends_one_quit() {
    let fixture = house_set();
    let service_socket = fixture.config.ipc.service_socket.clone();
    let peer = fixture.peer();
    let (mut service, _dir) = fixture.start(&CountingClock::default());
    peer.recv_snapshot();

    assert!(service_socket.exists());
    service.disconnect();
    assert_eq!(peer.recv(), UiMessage::Quit(Quit { quit: true }));
    assert!(!service_socket.exists());

    service.disconnect();
    service.scroll_vertical(true);
    assert_eq!(peer.drain(), 0);
}

#[test]
fn dropping_the_service_also_quits_the_peer() {
    let fixture = house_set();
    let peer = fixture.peer();
    let (service, _dir) = fixture.start(&CountingClock::default());
    peer.recv_snapshot();

    drop(service);
    assert_eq!(peer.recv(), UiMessage::Quit(Quit { quit: true }));
}

#[test]
fn late_peer_misses_early_snapshots_only() {
    let fixture = house_set();
    let ui_socket = fixture.config.ipc.ui_socket.clone();
    let clock = CountingClock::default();
    let (mut service, _dir) = fixture.start(&clock);

    assert_eq!(clock.sleeps.get(), 10);
    assert_eq!(service.channel_state(), ChannelState::Active);

    service.scroll_vertical(true);

    let late = UnixDatagram::bind(&ui_socket).unwrap();
    late.set_read_timeout(Some(std::time::Duration::from_secs(2)))
        .unwrap();
    service.scroll_vertical(true);

    let mut buf = vec![0u8; 512 * 1024];
    let n = late.recv(&mut buf).unwrap();
    match UiMessage::decode(&buf[..n]).unwrap() {
        UiMessage::Snapshot(snap) => assert_eq!(snap.sel_ix, 2),
        other => panic!("expected a snapshot, got {:?}", other),
    }
}

#[test]
fn stale_service_socket_is_replaced() {
    let fixture = house_set();
    std::fs::write(&fixture.config.ipc.service_socket, b"stale").unwrap();
    let peer = fixture.peer();
    let (mut service, _dir) = fixture.start(&CountingClock::default());
    peer.recv_snapshot();

    peer.send(br#"{"key_filter": false}"#);
    assert!(service.poll());
    assert!(!peer.recv_snapshot().key_filter);
}

#[test]
fn quit_line_ends_session_and_shutdown_returns() {
    let fixture = house_set();
    let peer = fixture.peer();
    let (service, _dir) = fixture.start(&CountingClock::default());
    peer.recv_snapshot();

    let mut session = HostSession::new(service);
    let mut lines = spawn_line_reader(std::io::Cursor::new("down\nbogus\nquit\ndown\n"));
    let mut handled = 0;
    while let Some(line) = lines.blocking_recv() {
        let Ok(cmd) = line.parse::<HostCommand>() else {
            continue;
        };
        handled += 1;
        if !session.handle(cmd) {
            break;
        }
    }
    assert_eq!(handled, 2);

    session.shutdown();
    assert_eq!(peer.recv_snapshot().sel_ix, 1);
    assert_eq!(peer.recv(), UiMessage::Quit(Quit { quit: true }));
    assert_eq!(peer.drain(), 0);
}

#[test]
fn line_reader_on_open_pipe_does_not_block_shutdown() {
    let fixture = house_set();
    let peer = fixture.peer();
    let (service, _dir) = fixture.start(&CountingClock::default());
    peer.recv_snapshot();

    // The writer stays alive, so the reader thread stays parked in read().
    let (reader, _writer) = std::os::unix::net::UnixStream::pair().unwrap();
    let mut lines = spawn_line_reader(std::io::BufReader::new(reader));
    assert!(lines.try_recv().is_err());

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();
    runtime.block_on(async {
        tokio::select! {
            _ = lines.recv() => panic!("no input was written"),
            _ = tokio::time::sleep(std::time::Duration::from_millis(20)) => {}
        }
    });
    drop(runtime);

    let session = HostSession::new(service);
    session.shutdown();
    assert_eq!(peer.recv(), UiMessage::Quit(Quit { quit: true }));
}
