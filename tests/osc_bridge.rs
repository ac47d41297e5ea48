use duration::message::{Action, Message};
use duration::{init, project};
use duration::settings::ProjectSettings;
use duration::timeline::track::TrackKind;
use rosc::{OscMessage, OscPacket, OscType, encoder};
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::mpsc::{self, Receiver};
use tokio::time::timeout;

fn scratch_dir(tag: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("duration-bridge-{tag}-{}", std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

async fn start(
    tag: &str,
    in_port: u16,
    out_port: u16,
) -> (duration::Client, tokio::task::JoinHandle<()>, Receiver<Message>) {
    let settings = ProjectSettings {
        osc_in_port: in_port,
        osc_out_port: out_port,
        ..ProjectSettings::default()
    };
    let (client, handle) = init(scratch_dir(tag), settings).await.unwrap();
    let (tx, rx) = mpsc::channel(64);
    client.subscribe(tx).await;
    (client, handle, rx)
}

async fn next_response(rx: &mut Receiver<Message>) -> Result<Action, String> {
    loop {
        let message = timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("timed out waiting for a response")
            .expect("controller hung up");
        if let Message::Response(result) = message {
            return result;
        }
    }
}

#[tokio::test]
async fn tracks_can_be_added_and_removed() {
    let (client, handle, mut rx) = start("tracks", 17346, 17345).await;

    client
        .add_track(TrackKind::Curves, Some("filter".to_string()))
        .await;
    match next_response(&mut rx).await {
        Ok(Action::AddTrack { kind, name, .. }) => {
            assert_eq!(kind, TrackKind::Curves);
            assert_eq!(name.as_deref(), Some("filter"));
        }
        other => panic!("unexpected response: {other:?}"),
    }

    client.remove_track("filter".to_string()).await;
    assert!(matches!(
        next_response(&mut rx).await,
        Ok(Action::RemoveTrack(_))
    ));

    client.quit().await;
    handle.await.unwrap();
}

#[tokio::test]
async fn a_second_audio_track_is_refused() {
    let (client, handle, mut rx) = start("audio", 17446, 17445).await;

    client.add_track(TrackKind::Audio, None).await;
    assert!(next_response(&mut rx).await.is_ok());

    client.add_track(TrackKind::Audio, None).await;
    let refused = next_response(&mut rx).await;
    assert!(refused.is_err(), "expected rejection, got {refused:?}");

    client.quit().await;
    handle.await.unwrap();
}

#[tokio::test]
async fn transport_and_osc_toggles_respond() {
    let (client, handle, mut rx) = start("transport", 17546, 17545).await;

    client.seek_seconds(2.0).await;
    assert!(matches!(
        next_response(&mut rx).await,
        Ok(Action::SeekSeconds(_))
    ));

    client.request(Action::EnableOscOut(false)).await;
    assert!(matches!(
        next_response(&mut rx).await,
        Ok(Action::EnableOscOut(false))
    ));

    client.request(Action::SetOscRate(0.0)).await;
    assert!(next_response(&mut rx).await.is_err());

    client.quit().await;
    handle.await.unwrap();
}

#[tokio::test]
async fn named_tracks_play_and_stop_independently() {
    let (client, handle, mut rx) = start("localplay", 17846, 17845).await;

    client
        .add_track(TrackKind::Curves, Some("fade".to_string()))
        .await;
    assert!(next_response(&mut rx).await.is_ok());

    client.request(Action::Play(vec!["/fade".to_string()])).await;
    match next_response(&mut rx).await {
        Ok(Action::Play(names)) => assert_eq!(names, vec!["/fade"]),
        other => panic!("unexpected response: {other:?}"),
    }

    client.request(Action::Stop(vec!["/fade".to_string()])).await;
    assert!(matches!(next_response(&mut rx).await, Ok(Action::Stop(_))));

    client.quit().await;
    handle.await.unwrap();
}

#[tokio::test]
async fn wire_seek_lands_exactly_and_bad_toggles_are_dropped() {
    let projects = scratch_dir("seekwire");
    let show = projects.join("Show");
    project::create(&show, "Show").unwrap();

    let in_port = 17746;
    let settings = ProjectSettings {
        osc_in_port: in_port,
        osc_out_port: 17745,
        ..ProjectSettings::default()
    };
    // Opening a project installs its saved OSC settings, so the on-disk
    // project must carry the same ports to keep the test port-isolated.
    let on_disk = ProjectSettings {
        path: show.clone(),
        name: "Show".to_string(),
        ..settings.clone()
    };
    project::save(
        &duration::timeline::Timeline::default(),
        &on_disk,
        &duration::osc::output::OutputDispatch::default(),
    )
    .unwrap();
    let (client, handle) = init(projects.clone(), settings).await.unwrap();
    let (tx, mut rx) = mpsc::channel(64);
    client.subscribe(tx).await;

    client.open(show.clone()).await;
    assert!(matches!(next_response(&mut rx).await, Ok(Action::Open(_))));

    let socket = tokio::net::UdpSocket::bind("127.0.0.1:0").await.unwrap();
    // Wrong argument type: the command must be dropped without touching the
    // enable flag.
    let bad = OscPacket::Message(OscMessage {
        addr: "/duration/enableoscout".to_string(),
        args: vec![OscType::Float(0.0)],
    });
    socket
        .send_to(&encoder::encode(&bad).unwrap(), ("127.0.0.1", in_port))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    let seek = OscPacket::Message(OscMessage {
        addr: "/duration/seektotimecode".to_string(),
        args: vec![OscType::String("00:00:01:000".to_string())],
    });
    socket
        .send_to(&encoder::encode(&seek).unwrap(), ("127.0.0.1", in_port))
        .await
        .unwrap();
    assert!(matches!(
        next_response(&mut rx).await,
        Ok(Action::SeekTimecode(_))
    ));

    client.save().await;
    assert!(matches!(next_response(&mut rx).await, Ok(Action::Save)));

    let saved = std::fs::read_to_string(show.join(".durationproj")).unwrap();
    assert!(saved.contains("<playhead>00:00:01:000</playhead>"), "{saved}");
    assert!(saved.contains("<oscOutEnabled>true</oscOutEnabled>"), "{saved}");

    client.quit().await;
    handle.await.unwrap();
}

#[tokio::test]
async fn commands_arrive_over_the_wire() {
    let in_port = 17646;
    let (client, handle, mut rx) = start("wire", in_port, 17645).await;

    let packet = OscPacket::Message(OscMessage {
        addr: "/duration/addtrack".to_string(),
        args: vec![
            OscType::String("bangs".to_string()),
            OscType::String("hits".to_string()),
        ],
    });
    let bytes = encoder::encode(&packet).unwrap();
    let socket = tokio::net::UdpSocket::bind("127.0.0.1:0").await.unwrap();
    socket
        .send_to(&bytes, ("127.0.0.1", in_port))
        .await
        .unwrap();

    match next_response(&mut rx).await {
        Ok(Action::AddTrack { kind, name, .. }) => {
            assert_eq!(kind, TrackKind::Bangs);
            assert_eq!(name.as_deref(), Some("hits"));
        }
        other => panic!("unexpected response: {other:?}"),
    }

    client.quit().await;
    handle.await.unwrap();
}
