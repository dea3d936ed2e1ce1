use simlink::prelude::*;
use simlink_host_emulator::{AdHocMode, EmulatorOption};

fn connect(option: EmulatorOption) -> anyhow::Result<Connection<Audit>> {
    Ok(Connection::open(Audit::new(option), ConnectionOption::default())?)
}

#[test]
fn lifecycle() -> anyhow::Result<()> {
    let connection = connect(EmulatorOption {
        first_request_id: 7,
        ..Default::default()
    })?;
    let us = Ultrasonic::open(&connection, "front", "ego", SensorConfig::default())?;

    let id = us.send_ad_hoc_poll_request()?;
    assert_eq!(RequestId::new(7), id);
    assert_eq!(Some(RequestState::Pending), connection.request_state(id));
    assert!(!us.is_ad_hoc_poll_request_ready(id)?);

    assert!(connection.with_link(|link| link.mark_ready(7)));
    assert!(us.is_ad_hoc_poll_request_ready(id)?);
    assert_eq!(Some(RequestState::Ready), connection.request_state(id));

    assert_eq!(
        UltrasonicReading {
            distance: 1.5,
            window_min: 0.15,
            window_max: 5.5,
        },
        us.collect_ad_hoc_poll_request(id)?
    );
    assert_eq!(None, connection.request_state(id));

    let sent = connection.with_link(|link| link.sent_frames());
    assert_eq!(
        Err(SimError::Poll(PollError::UnknownRequest(id))),
        us.collect_ad_hoc_poll_request(id)
    );
    assert_eq!(
        Err(SimError::Poll(PollError::UnknownRequest(id))),
        us.is_ad_hoc_poll_request_ready(id)
    );
    assert_eq!(sent, connection.with_link(|link| link.sent_frames()));
    Ok(())
}

#[test]
fn collect_before_ready() -> anyhow::Result<()> {
    let connection = connect(EmulatorOption::default())?;
    let us = Ultrasonic::open(&connection, "front", "ego", SensorConfig::default())?;

    let id = us.send_ad_hoc_poll_request()?;
    assert_eq!(
        Err(SimError::Poll(PollError::NotReady(id))),
        us.collect_ad_hoc_poll_request(id)
    );
    assert_eq!(Some(RequestState::Pending), connection.request_state(id));

    assert!(connection.with_link(|link| link.mark_ready(id.get())));
    us.collect_ad_hoc_poll_request(id)?;
    Ok(())
}

#[test]
fn pending_limit() -> anyhow::Result<()> {
    let connection = connect(EmulatorOption::default())?;
    let us = Ultrasonic::open(
        &connection,
        "front",
        "ego",
        SensorConfig {
            max_pending_requests: 5,
            ..Default::default()
        },
    )?;

    let ids = (0..5)
        .map(|_| us.send_ad_hoc_poll_request())
        .collect::<Result<Vec<_>, _>>()?;
    assert_eq!(ids, connection.pending_requests(us.handle()));

    let sent = connection.with_link(|link| link.sent_frames());
    assert_eq!(
        Err(SimError::Poll(PollError::TooManyPending {
            sensor: "front".to_owned(),
            limit: 5
        })),
        us.send_ad_hoc_poll_request()
    );
    assert_eq!(sent, connection.with_link(|link| link.sent_frames()));

    assert!(connection.with_link(|link| link.mark_ready(ids[0].get())));
    us.collect_ad_hoc_poll_request(ids[0])?;
    us.send_ad_hoc_poll_request()?;
    Ok(())
}

#[rstest::rstest]
#[test]
#[case(Value::Int(2))]
#[case(Value::Float(2.0))]
fn raised_limit_applies(#[case] limit: Value) -> anyhow::Result<()> {
    let connection = connect(EmulatorOption::default())?;
    let us = Ultrasonic::open(
        &connection,
        "front",
        "ego",
        SensorConfig {
            max_pending_requests: 1,
            ..Default::default()
        },
    )?;

    us.send_ad_hoc_poll_request()?;
    assert!(us.send_ad_hoc_poll_request().is_err());

    us.set_property(Property::MaxPendingRequests, limit)?;
    us.send_ad_hoc_poll_request()?;
    assert_eq!(
        Err(SimError::Poll(PollError::TooManyPending {
            sensor: "front".to_owned(),
            limit: 2
        })),
        us.send_ad_hoc_poll_request()
    );
    Ok(())
}

#[test]
fn requests_belong_to_their_sensor() -> anyhow::Result<()> {
    let connection = connect(EmulatorOption::default())?;
    let front = Ultrasonic::open(&connection, "front", "ego", SensorConfig::default())?;
    let rear = Ultrasonic::open(&connection, "rear", "ego", SensorConfig::default())?;

    let id = front.send_ad_hoc_poll_request()?;
    assert!(connection.with_link(|link| link.mark_ready(id.get())));
    assert_eq!(
        Err(SimError::Poll(PollError::UnknownRequest(id))),
        rear.collect_ad_hoc_poll_request(id)
    );
    front.collect_ad_hoc_poll_request(id)?;
    Ok(())
}

#[test]
fn removing_sensor_discards_requests() -> anyhow::Result<()> {
    let connection = connect(EmulatorOption::default())?;
    let us = Ultrasonic::open(&connection, "front", "ego", SensorConfig::default())?;
    let ids = [us.send_ad_hoc_poll_request()?, us.send_ad_hoc_poll_request()?];
    us.remove()?;

    ids.iter()
        .for_each(|id| assert_eq!(None, connection.request_state(*id)));
    assert_eq!(
        0,
        connection.with_link(|link| link.pending_requests().count())
    );
    assert_eq!(
        Err(SimError::Poll(PollError::UnknownRequest(ids[0]))),
        connection.collect_ad_hoc_poll_request(ids[0]).map(|_| ())
    );

    let us = Ultrasonic::open(&connection, "front", "ego", SensorConfig::default())?;
    assert!(connection.pending_requests(us.handle()).is_empty());
    Ok(())
}

#[test]
fn immediate_host() -> anyhow::Result<()> {
    let connection = connect(EmulatorOption {
        adhoc_mode: AdHocMode::Immediate,
        ..Default::default()
    })?;
    let us = Ultrasonic::open(&connection, "front", "ego", SensorConfig::default())?;

    let id = us.send_ad_hoc_poll_request()?;
    assert_eq!(1.5, us.collect_ad_hoc_poll_request(id)?.distance);
    Ok(())
}
