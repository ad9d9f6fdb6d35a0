//! Session node state-machine tests.
//!
//! Drives the node synchronously through its single handling entry point and
//! checks the membership, fan-out, and isolation guarantees after each step.

use aircast_core::media::{MediaStream, SourceKind};
use aircast_core::session::{Action, Command, Lifecycle, Role, SessionNode, TransportEvent};
use aircast_core::{CaptureError, PeerId};
use std::sync::Arc;

fn identified(role: Role) -> SessionNode {
    let mut node = SessionNode::new();
    node.handle(TransportEvent::IdentityAssigned(PeerId::from("abc123")).into());
    node.handle(Command::SetRole(role).into());
    node
}

fn open_peer(node: &mut SessionNode, id: &str) -> Vec<Action> {
    node.handle(
        TransportEvent::ConnectionOpened {
            remote: PeerId::from(id),
        }
        .into(),
    )
}

/// Run StartBroadcast through capture resolution with a live tone stream.
fn start_broadcast(node: &mut SessionNode) -> (Arc<MediaStream>, Vec<Action>) {
    let actions = node.handle(Command::StartBroadcast.into());
    let source = match &actions[..] {
        [Action::RequestCapture { source }] => *source,
        other => panic!("expected a capture request, got {other:?}"),
    };
    let stream = Arc::new(MediaStream::new(source, 48_000));
    let actions = node.handle(aircast_core::session::SessionEvent::CaptureReady {
        source,
        result: Ok(Arc::clone(&stream)),
    });
    (stream, actions)
}

fn assert_fan_out_consistent(node: &SessionNode) {
    let stream = node.local_stream().expect("active broadcast has a stream");
    let peers = node.peers();
    assert_eq!(node.broadcast().outbound_sessions().count(), peers.len());
    for peer in &peers {
        let session = node
            .broadcast()
            .outbound_to(peer)
            .unwrap_or_else(|| panic!("no outbound session for {peer}"));
        assert!(Arc::ptr_eq(session.stream().unwrap(), stream));
    }
}

#[test]
fn registry_never_holds_duplicate_identities() {
    let mut node = identified(Role::Broadcaster);

    open_peer(&mut node, "a");
    open_peer(&mut node, "a");
    open_peer(&mut node, "b");
    assert_eq!(node.peers(), vec![PeerId::from("a"), PeerId::from("b")]);

    node.handle(
        TransportEvent::ConnectionClosed {
            remote: PeerId::from("a"),
        }
        .into(),
    );
    // Removing a departed (or never-joined) peer is a no-op.
    node.handle(
        TransportEvent::ConnectionClosed {
            remote: PeerId::from("a"),
        }
        .into(),
    );
    node.handle(
        TransportEvent::ConnectionFailed {
            remote: PeerId::from("never-joined"),
            reason: "ice failure".into(),
        }
        .into(),
    );
    assert_eq!(node.peers(), vec![PeerId::from("b")]);

    // Rejoin after departure is a fresh registration, not a duplicate.
    open_peer(&mut node, "a");
    assert_eq!(node.peers(), vec![PeerId::from("b"), PeerId::from("a")]);
}

#[test]
fn fan_out_holds_after_start_and_after_join() {
    let mut node = identified(Role::Broadcaster);
    open_peer(&mut node, "a");
    open_peer(&mut node, "b");

    let (stream, actions) = start_broadcast(&mut node);
    assert!(node.is_active());
    assert_eq!(actions.len(), 2);
    for action in &actions {
        match action {
            Action::PlaceCall { stream: s, .. } => assert!(Arc::ptr_eq(s, &stream)),
            other => panic!("expected a call, got {other:?}"),
        }
    }
    assert_fan_out_consistent(&node);

    let actions = open_peer(&mut node, "c");
    assert!(
        matches!(&actions[..], [Action::PlaceCall { remote, .. }] if remote == &PeerId::from("c"))
    );
    assert_fan_out_consistent(&node);
}

#[test]
fn late_join_session_exists_before_next_registry_read() {
    let mut node = identified(Role::Broadcaster);
    let (_stream, actions) = start_broadcast(&mut node);
    assert!(actions.is_empty(), "no peers yet, no calls");
    assert!(node.peers().is_empty());

    let actions = open_peer(&mut node, "xyz789");
    assert_eq!(node.peers(), vec![PeerId::from("xyz789")]);
    assert!(node.broadcast().outbound_to(&PeerId::from("xyz789")).is_some());
    assert!(
        matches!(&actions[..], [Action::PlaceCall { remote, .. }] if remote == &PeerId::from("xyz789"))
    );
}

#[test]
fn stop_is_idempotent_even_without_a_broadcast() {
    let mut node = identified(Role::Broadcaster);

    node.handle(Command::StopBroadcast.into());
    assert!(!node.is_active());
    assert!(node.local_stream().is_none());

    let (stream, _) = start_broadcast(&mut node);
    node.handle(Command::StopBroadcast.into());
    node.handle(Command::StopBroadcast.into());
    assert!(!node.is_active());
    assert!(node.local_stream().is_none());
    assert!(!stream.is_live());
}

#[test]
fn one_peers_failure_leaves_the_other_untouched() {
    let mut node = identified(Role::Broadcaster);
    open_peer(&mut node, "a");
    open_peer(&mut node, "b");
    start_broadcast(&mut node);

    node.handle(
        TransportEvent::ConnectionFailed {
            remote: PeerId::from("a"),
            reason: "data channel errored".into(),
        }
        .into(),
    );

    assert_eq!(node.peers(), vec![PeerId::from("b")]);
    let session = node.broadcast().outbound_to(&PeerId::from("b")).unwrap();
    assert!(session.stream().unwrap().is_live());
    assert!(node.broadcast().outbound_to(&PeerId::from("a")).is_none());
    assert!(node.is_active());
}

#[test]
fn role_toggle_stops_an_active_broadcast_first() {
    let mut node = identified(Role::Broadcaster);
    open_peer(&mut node, "a");
    let (stream, _) = start_broadcast(&mut node);
    assert!(node.is_active());

    node.handle(Command::SetRole(Role::Listener).into());
    assert_eq!(node.role(), Role::Listener);
    assert!(!node.is_active());
    assert!(!stream.is_live());
    assert!(node.local_stream().is_none());
    // The data-connection itself survives the role change.
    assert_eq!(node.peers(), vec![PeerId::from("a")]);
}

#[test]
fn broadcast_scenario_end_to_end() {
    let mut node = SessionNode::new();
    node.handle(TransportEvent::IdentityAssigned(PeerId::from("abc123")).into());
    assert_eq!(node.identity(), Some(&PeerId::from("abc123")));

    node.handle(Command::SetRole(Role::Broadcaster).into());
    node.handle(Command::SetSource(SourceKind::Microphone).into());

    let (stream, actions) = start_broadcast(&mut node);
    assert!(node.is_active());
    assert!(node.peers().is_empty());
    assert!(actions.is_empty());
    assert_eq!(node.broadcast().outbound_sessions().count(), 0);

    let actions = open_peer(&mut node, "xyz789");
    assert_eq!(node.peers(), vec![PeerId::from("xyz789")]);
    assert_eq!(actions.len(), 1);
    assert_fan_out_consistent(&node);

    node.handle(Command::StopBroadcast.into());
    assert!(!node.is_active());
    assert!(node.local_stream().is_none());
    assert!(!stream.is_live());
    // Still connected via the data-connection.
    assert_eq!(node.peers(), vec![PeerId::from("xyz789")]);
}

#[test]
fn capture_denied_leaves_broadcast_inactive() {
    let mut node = identified(Role::Broadcaster);
    let actions = node.handle(Command::StartBroadcast.into());
    let source = match &actions[..] {
        [Action::RequestCapture { source }] => *source,
        other => panic!("expected a capture request, got {other:?}"),
    };

    let actions = node.handle(aircast_core::session::SessionEvent::CaptureReady {
        source,
        result: Err(CaptureError::Denied("permission refused".into())),
    });
    assert!(actions.is_empty());
    assert!(!node.is_active());

    // The operator may retry with another source.
    node.handle(Command::SetSource(SourceKind::DisplayAudio).into());
    let actions = node.handle(Command::StartBroadcast.into());
    assert!(matches!(
        &actions[..],
        [Action::RequestCapture {
            source: SourceKind::DisplayAudio
        }]
    ));
}

#[test]
fn audioless_capture_is_rejected() {
    let mut node = identified(Role::Broadcaster);
    let actions = node.handle(Command::StartBroadcast.into());
    let source = match &actions[..] {
        [Action::RequestCapture { source }] => *source,
        other => panic!("expected a capture request, got {other:?}"),
    };

    let stream = Arc::new(MediaStream::without_audio(source));
    let actions = node.handle(aircast_core::session::SessionEvent::CaptureReady {
        source,
        result: Ok(stream),
    });
    assert!(actions.is_empty());
    assert!(!node.is_active());
    assert!(node.local_stream().is_none());
}

#[test]
fn stop_during_pending_capture_discards_the_late_stream() {
    let mut node = identified(Role::Broadcaster);
    open_peer(&mut node, "a");

    let actions = node.handle(Command::StartBroadcast.into());
    let source = match &actions[..] {
        [Action::RequestCapture { source }] => *source,
        other => panic!("expected a capture request, got {other:?}"),
    };
    node.handle(Command::StopBroadcast.into());

    // The permission prompt resolves after the stop: the stream must be
    // stopped on arrival, never attached or fanned out.
    let stream = Arc::new(MediaStream::new(source, 48_000));
    let actions = node.handle(aircast_core::session::SessionEvent::CaptureReady {
        source,
        result: Ok(Arc::clone(&stream)),
    });
    assert!(actions.is_empty());
    assert!(!node.is_active());
    assert!(!stream.is_live());
    assert_eq!(node.broadcast().outbound_sessions().count(), 0);
}

#[test]
fn role_change_during_pending_capture_discards_the_late_stream() {
    let mut node = identified(Role::Broadcaster);
    let actions = node.handle(Command::StartBroadcast.into());
    let source = match &actions[..] {
        [Action::RequestCapture { source }] => *source,
        other => panic!("expected a capture request, got {other:?}"),
    };

    node.handle(Command::SetRole(Role::Listener).into());

    let stream = Arc::new(MediaStream::new(source, 48_000));
    let actions = node.handle(aircast_core::session::SessionEvent::CaptureReady {
        source,
        result: Ok(Arc::clone(&stream)),
    });
    assert!(actions.is_empty());
    assert!(!node.is_active());
    assert!(!stream.is_live());
}

#[test]
fn start_is_ignored_for_listeners_and_while_active() {
    let mut node = identified(Role::Listener);
    assert!(node.handle(Command::StartBroadcast.into()).is_empty());

    node.handle(Command::SetRole(Role::Broadcaster).into());
    start_broadcast(&mut node);
    // Already active: no second capture request.
    assert!(node.handle(Command::StartBroadcast.into()).is_empty());
}

#[test]
fn source_change_rejected_only_while_broadcasting() {
    let mut node = identified(Role::Broadcaster);
    node.handle(Command::SetSource(SourceKind::DisplayAudio).into());
    assert_eq!(node.source(), SourceKind::DisplayAudio);

    node.handle(Command::SetSource(SourceKind::Microphone).into());
    start_broadcast(&mut node);
    node.handle(Command::SetSource(SourceKind::DisplayAudio).into());
    assert_eq!(node.source(), SourceKind::Microphone);

    node.handle(Command::StopBroadcast.into());
    node.handle(Command::SetSource(SourceKind::DisplayAudio).into());
    assert_eq!(node.source(), SourceKind::DisplayAudio);
}

#[test]
fn toggle_starts_and_stops() {
    let mut node = identified(Role::Broadcaster);

    let actions = node.handle(Command::ToggleBroadcast.into());
    let source = match &actions[..] {
        [Action::RequestCapture { source }] => *source,
        other => panic!("expected a capture request, got {other:?}"),
    };
    let stream = Arc::new(MediaStream::new(source, 48_000));
    node.handle(aircast_core::session::SessionEvent::CaptureReady {
        source,
        result: Ok(Arc::clone(&stream)),
    });
    assert!(node.is_active());

    node.handle(Command::ToggleBroadcast.into());
    assert!(!node.is_active());
    assert!(!stream.is_live());
}

#[test]
fn dial_failure_before_open_leaves_no_trace() {
    let mut node = identified(Role::Listener);
    let actions = node.handle(
        Command::Connect {
            remote: PeerId::from("host"),
        }
        .into(),
    );
    assert_eq!(actions.len(), 1);
    assert_eq!(node.pending_connections(), 1);

    // Dialing again while the first attempt is in flight is a no-op.
    let actions = node.handle(
        Command::Connect {
            remote: PeerId::from("host"),
        }
        .into(),
    );
    assert!(actions.is_empty());

    node.handle(
        TransportEvent::ConnectionFailed {
            remote: PeerId::from("host"),
            reason: "unreachable".into(),
        }
        .into(),
    );
    assert_eq!(node.pending_connections(), 0);
    assert!(node.peers().is_empty());

    // A retry after the failure dials afresh.
    let actions = node.handle(
        Command::Connect {
            remote: PeerId::from("host"),
        }
        .into(),
    );
    assert_eq!(actions.len(), 1);
}

#[test]
fn inbound_calls_are_answered_and_routed() {
    let mut node = identified(Role::Listener);

    let actions = node.handle(
        TransportEvent::CallOffered {
            remote: PeerId::from("host"),
        }
        .into(),
    );
    assert!(
        matches!(&actions[..], [Action::AnswerCall { remote }] if remote == &PeerId::from("host"))
    );
    assert_eq!(node.inbound_sessions().count(), 1);

    let stream = Arc::new(MediaStream::new(SourceKind::Microphone, 48_000));
    let actions = node.handle(
        TransportEvent::CallStream {
            remote: PeerId::from("host"),
            stream: Arc::clone(&stream),
        }
        .into(),
    );
    match &actions[..] {
        [Action::RoutePlayback { remote, stream: s }] => {
            assert_eq!(remote, &PeerId::from("host"));
            assert!(Arc::ptr_eq(s, &stream));
        }
        other => panic!("expected playback routing, got {other:?}"),
    }

    // A stream for a call nobody offered is discarded quietly.
    let orphan = Arc::new(MediaStream::new(SourceKind::Microphone, 48_000));
    let actions = node.handle(
        TransportEvent::CallStream {
            remote: PeerId::from("stranger"),
            stream: orphan,
        }
        .into(),
    );
    assert!(actions.is_empty());
}

#[test]
fn call_failure_discards_only_that_session() {
    let mut node = identified(Role::Listener);
    node.handle(
        TransportEvent::CallOffered {
            remote: PeerId::from("host-a"),
        }
        .into(),
    );
    node.handle(
        TransportEvent::CallOffered {
            remote: PeerId::from("host-b"),
        }
        .into(),
    );
    assert_eq!(node.inbound_sessions().count(), 2);

    node.handle(
        TransportEvent::CallFailed {
            remote: PeerId::from("host-a"),
            reason: "media timeout".into(),
        }
        .into(),
    );
    let remaining: Vec<&PeerId> = node.inbound_sessions().map(|s| s.remote()).collect();
    assert_eq!(remaining, vec![&PeerId::from("host-b")]);
}

#[test]
fn shutdown_clears_everything_and_goes_quiet() {
    let mut node = identified(Role::Broadcaster);
    open_peer(&mut node, "a");
    let (stream, _) = start_broadcast(&mut node);

    node.handle(Command::Shutdown.into());
    assert_eq!(node.lifecycle(), &Lifecycle::Closed);
    assert!(node.peers().is_empty());
    assert!(!node.is_active());
    assert!(!stream.is_live());
    assert_eq!(node.inbound_sessions().count(), 0);

    // A destroyed node processes nothing further.
    assert!(open_peer(&mut node, "b").is_empty());
    assert!(node.peers().is_empty());
}
