use commentseal::config::{FALLBACK_ROUNDS_RANGE, ITERATIONS_RANGE, NONCE_LEN};
use commentseal::probe::CipherSupport;
use commentseal::varmor::{self, Family};
use commentseal::{Codec, CodecConfig, Decoded, ErrorKind, PayloadClass, SaltSource, classify, fallback};
use proptest::prelude::*;

fn codec() -> Codec {
    Codec::with_support(
        CodecConfig::default().with_iterations(*ITERATIONS_RANGE.start()),
        CipherSupport::Available,
    )
    .unwrap()
}

fn secret() -> impl Strategy<Value = Vec<u8>> {
    proptest::collection::vec(any::<u8>(), 1..48)
}

proptest! {
    // Every case runs PBKDF2, so keep the case count modest.
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn roundtrip_arbitrary_text(text in any::<String>(), secret in secret()) {
        let codec = codec();
        let encoded = codec.encode(&text, &secret, &SaltSource::Random).unwrap();
        prop_assert_eq!(classify(&encoded), PayloadClass::Primary);
        let decoded = codec.decode(&encoded, &secret).unwrap();
        prop_assert_eq!(decoded, Decoded::Verified(text));
    }

    #[test]
    fn encoding_twice_differs(text in any::<String>(), secret in secret()) {
        let codec = codec();
        let first = codec.encode(&text, &secret, &SaltSource::Random).unwrap();
        let second = codec.encode(&text, &secret, &SaltSource::Random).unwrap();
        prop_assert_ne!(first, second);
    }

    #[test]
    fn distinct_secret_fails_authentication(
        text in any::<String>(),
        secret in secret(),
        other in secret(),
    ) {
        prop_assume!(secret != other);
        let codec = codec();
        let encoded = codec.encode(&text, &secret, &SaltSource::Random).unwrap();
        let err = codec.decode(&encoded, &other).unwrap_err();
        prop_assert_eq!(err.kind, Some(ErrorKind::AuthenticationFailed));
    }

    #[test]
    fn flipped_sealed_byte_fails_authentication(
        text in any::<String>(),
        secret in secret(),
        index in any::<prop::sample::Index>(),
        mask in 1u8..=255,
    ) {
        let codec = codec();
        let encoded = codec.encode(&text, &secret, &SaltSource::Random).unwrap();
        let (_, mut body) = varmor::unwrap(&encoded).unwrap();
        let sealed_start = 2 + codec.config().salt_len + NONCE_LEN;
        let target = sealed_start + index.index(body.len() - sealed_start);
        body[target] ^= mask;

        let tampered = varmor::wrap(Family::Primary, &body);
        let err = codec.decode(&tampered, &secret).unwrap_err();
        prop_assert_eq!(err.kind, Some(ErrorKind::AuthenticationFailed));
    }
}

proptest! {
    #[test]
    fn unmarked_text_is_not_encoded(text in any::<String>(), secret in secret()) {
        prop_assume!(!text.starts_with(varmor::PRIMARY_MARKER));
        prop_assume!(!text.starts_with(varmor::FALLBACK_MARKER));
        prop_assert_eq!(classify(&text), PayloadClass::Plaintext);
        prop_assert_eq!(codec().decode(&text, &secret).unwrap(), Decoded::NotEncoded);
    }

    #[test]
    fn fallback_roundtrips_arbitrary_bytes(
        data in proptest::collection::vec(any::<u8>(), 0..512),
        secret in secret(),
        salt in proptest::collection::vec(any::<u8>(), 8..64),
        rounds in FALLBACK_ROUNDS_RANGE,
    ) {
        let body = fallback::seal(&secret, &data, &salt, rounds).unwrap();
        let recovered = fallback::open(&secret, &body, rounds).unwrap();
        prop_assert_eq!(recovered, data);
    }

    #[test]
    fn fallback_codec_roundtrips_text(
        text in any::<String>(),
        secret in secret(),
        rounds in FALLBACK_ROUNDS_RANGE,
    ) {
        let codec = Codec::with_support(
            CodecConfig::default()
                .with_iterations(*ITERATIONS_RANGE.start())
                .with_fallback_rounds(rounds),
            CipherSupport::Unavailable,
        )
        .unwrap();
        let encoded = codec.encode(&text, &secret, &SaltSource::Random).unwrap();
        prop_assert_eq!(classify(&encoded), PayloadClass::Fallback);
        prop_assert_eq!(codec.decode(&encoded, &secret).unwrap(), Decoded::Unverified(text));
    }
}
