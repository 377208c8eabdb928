mod common;

use std::{
    collections::BTreeSet,
    thread,
    time::{Duration, Instant},
};

use common::{SLACK, open_loopback};
use rawhid::{
    channel::{CommsError, Packet},
    payload::{self, NumberMessage},
};

#[test]
fn blocked_reader_does_not_hold_up_the_writer() {
    let (device, peer) = open_loopback("loopback/0");

    thread::scope(|s| {
        let reader = s.spawn(|| device.receive::<64>(None));

        // Give the reader time to block.
        thread::sleep(Duration::from_millis(50));

        let start = Instant::now();
        device
            .send(&Packet::from(payload::encode_number::<64>(42)), Some(Duration::from_secs(1)))
            .unwrap();
        assert!(start.elapsed() < SLACK);

        let output = peer.recv_output(Duration::from_secs(1)).unwrap();
        peer.push_input(&output);

        let packet = reader.join().unwrap().unwrap();
        assert_eq!(payload::decode_number(&packet), Some(42));
    });
}

#[test]
fn concurrent_send_and_receive_keep_their_order() {
    let (device, peer) = open_loopback("loopback/0");
    const COUNT: u16 = 20;

    thread::scope(|s| {
        s.spawn(|| peer.echo_until_idle(Duration::from_millis(300)));

        let reader = s.spawn(|| {
            (0..COUNT)
                .map(|_| device.receive::<64>(Some(Duration::from_secs(2))))
                .collect::<Result<Vec<_>, CommsError>>()
        });

        s.spawn(|| {
            for number in 0..COUNT {
                let packet = Packet::from(payload::encode_number::<64>(number));
                device.send(&packet, Some(Duration::from_secs(1))).unwrap();
                thread::sleep(Duration::from_millis(5));
            }
        });

        let numbers: Vec<_> = reader
            .join()
            .unwrap()
            .unwrap()
            .iter()
            .map(|packet| NumberMessage::parse(packet))
            .collect();
        assert_eq!(
            numbers,
            (0..COUNT)
                .map(|n| Some(NumberMessage::Number(n)))
                .collect::<Vec<_>>()
        );
    });
}

/// Two readers on one device race for packets. Neither sees the whole stream,
/// but nothing is lost or duplicated either.
#[test]
fn competing_readers_split_the_stream() {
    let (device, peer) = open_loopback("loopback/0");
    const COUNT: u16 = 100;

    for number in 0..COUNT {
        peer.push_input(&payload::encode_number::<64>(number));
    }

    let drain = || {
        let mut seen = Vec::new();
        loop {
            match device.receive::<64>(Some(Duration::from_millis(100))) {
                Ok(packet) => seen.extend(payload::decode_number(&packet)),
                Err(CommsError::Timeout) => return seen,
                Err(err) => panic!("unexpected error: {err}"),
            }
        }
    };

    let (first, second) = thread::scope(|s| {
        let first = s.spawn(drain);
        let second = s.spawn(drain);
        (first.join().unwrap(), second.join().unwrap())
    });

    let first: BTreeSet<u16> = first.into_iter().collect();
    let second: BTreeSet<u16> = second.into_iter().collect();

    assert!(first.is_disjoint(&second));
    assert_eq!(first.len() + second.len(), usize::from(COUNT));
    assert_eq!(
        first.union(&second).copied().collect::<Vec<_>>(),
        (0..COUNT).collect::<Vec<_>>()
    );
}
