use identity::{BroadcastIdentifier, Cryptogram, SIGNATURE_SIZE};
use proptest::prelude::*;

fn identifier_strategy() -> impl Strategy<Value = BroadcastIdentifier> {
    (
        any::<[u8; 2]>(),
        proptest::collection::vec(any::<u8>(), Cryptogram::SIZE),
        any::<i8>(),
        0i32..86_400,
        any::<[u8; SIGNATURE_SIZE]>(),
    )
        .prop_map(|(country_code, cryptogram, tx_power, transmission_time, hmac_signature)| {
            BroadcastIdentifier {
                country_code,
                cryptogram: Cryptogram::from_bytes(&cryptogram).unwrap(),
                tx_power,
                transmission_time,
                hmac_signature,
            }
        })
}

proptest! {
    #[test]
    fn decode_inverts_encode(identifier in identifier_strategy()) {
        let bytes = identifier.to_bytes();
        prop_assert_eq!(bytes.len(), BroadcastIdentifier::SIZE);
        prop_assert_eq!(BroadcastIdentifier::from_bytes(&bytes).unwrap(), identifier);
    }

    #[test]
    fn decode_rejects_every_other_length(len in 0usize..256) {
        prop_assume!(len != BroadcastIdentifier::SIZE);
        let bytes = vec![0u8; len];
        prop_assert!(BroadcastIdentifier::from_bytes(&bytes).unwrap_err().is_format_error());
    }
}
