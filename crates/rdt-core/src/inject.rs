use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rdt_abstract::{Fault, FaultConfig, FaultInjector, Packet, Transport};
use tracing::debug;

use crate::codec;

/// Coin-flip injector driven by a seeded RNG, so runs are reproducible.
pub struct RandomFaults {
    config: FaultConfig,
    rng: StdRng,
}

impl RandomFaults {
    pub fn new(config: FaultConfig, seed: u64) -> Self {
        Self {
            config,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    fn flip(&mut self, rate: f64) -> bool {
        rate > 0.0 && self.rng.random::<f64>() < rate
    }
}

impl FaultInjector for RandomFaults {
    fn decide(&mut self, _packet: &Packet) -> Fault {
        // Priority order; the first coin that lands wins.
        if self.flip(self.config.drop_rate) {
            Fault::Drop
        } else if self.flip(self.config.corrupt_checksum_rate) {
            Fault::CorruptChecksum
        } else if self.flip(self.config.corrupt_sequence_rate) {
            Fault::CorruptSequence
        } else {
            Fault::Pass
        }
    }
}

/// Turn a sealed packet into what actually leaves the host.
///
/// `None` means the datagram is suppressed.
pub fn apply(fault: Fault, mut packet: Packet) -> Option<Packet> {
    match fault {
        Fault::Pass => Some(packet),
        Fault::Drop => None,
        Fault::CorruptChecksum => {
            // The fold fits in one byte, so its complement never verifies.
            packet.header.checksum = !packet.header.checksum;
            Some(packet)
        }
        Fault::CorruptSequence => {
            // Flipped after sealing, so the receiver sees a checksum failure
            // rather than a plausible packet from the other half of the cycle.
            packet.header.seq ^= 1;
            Some(packet)
        }
    }
}

/// Seal `packet`, run it past the injector and hand the result to the transport.
///
/// Returns the fault that was applied.
pub async fn transmit<T, F>(
    transport: &mut T,
    injector: &mut F,
    packet: Packet,
) -> std::io::Result<Fault>
where
    T: Transport,
    F: FaultInjector,
{
    let packet = codec::seal(packet);
    let fault = injector.decide(&packet);
    match apply(fault, packet) {
        Some(packet) => {
            if fault != Fault::Pass {
                debug!(
                    "[SIMULATE] {:?}: seq={} len={} checksum={}",
                    fault, packet.header.seq, packet.header.len, packet.header.checksum
                );
            }
            transport.send_datagram(&codec::encode(&packet)).await?;
        }
        None => debug!("[SIMULATE] dropping packet"),
    }
    Ok(fault)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use rdt_abstract::SeqBit;

    fn sealed() -> Packet {
        codec::seal(Packet::data(SeqBit::Zero, Bytes::from_static(b"chunk")))
    }

    fn ack() -> Packet {
        Packet::ack(SeqBit::Zero)
    }

    #[test]
    fn clean_config_always_passes() {
        let mut faults = RandomFaults::new(FaultConfig::default(), 7);
        assert!((0..1000).all(|_| faults.decide(&ack()) == Fault::Pass));
    }

    #[test]
    fn certain_drop_wins_over_corruption() {
        let config = FaultConfig {
            drop_rate: 1.0,
            corrupt_checksum_rate: 1.0,
            corrupt_sequence_rate: 1.0,
        };
        let mut faults = RandomFaults::new(config, 1);
        assert!((0..100).all(|_| faults.decide(&ack()) == Fault::Drop));
    }

    #[test]
    fn checksum_corruption_wins_over_sequence() {
        let config = FaultConfig {
            drop_rate: 0.0,
            corrupt_checksum_rate: 1.0,
            corrupt_sequence_rate: 1.0,
        };
        let mut faults = RandomFaults::new(config, 1);
        assert!((0..100).all(|_| faults.decide(&ack()) == Fault::CorruptChecksum));
    }

    #[test]
    fn same_seed_same_decisions() {
        let run = |seed| {
            let mut faults = RandomFaults::new(FaultConfig::reference(), seed);
            (0..64).map(|_| faults.decide(&ack())).collect::<Vec<_>>()
        };
        assert_eq!(run(42), run(42));
    }

    #[test]
    fn reference_rates_are_roughly_honoured() {
        let mut faults = RandomFaults::new(FaultConfig::reference(), 3);
        let drops = (0..10_000)
            .filter(|_| faults.decide(&ack()) == Fault::Drop)
            .count();
        assert!((4_500..5_500).contains(&drops), "drops = {drops}");
    }

    #[test]
    fn drop_suppresses_packet() {
        assert!(apply(Fault::Drop, sealed()).is_none());
    }

    #[test]
    fn corrupt_checksum_never_verifies() {
        let packet = apply(Fault::CorruptChecksum, sealed()).unwrap();
        assert!(codec::verify(&packet).is_err());
    }

    #[test]
    fn corrupt_sequence_flips_bit_under_stale_checksum() {
        let packet = apply(Fault::CorruptSequence, sealed()).unwrap();
        assert_eq!(packet.seq_bit(), Some(SeqBit::One));
        assert_eq!(packet.body(), b"chunk");
        assert!(matches!(
            codec::verify(&packet),
            Err(crate::error::Rejection::ChecksumMismatch { .. })
        ));
    }
}
