//! Shared RSA key material for peer tests.

use std::sync::OnceLock;

use rand::rngs::OsRng;
use rsa::RsaPrivateKey;

use devauth_core::{ProverKey, RsaSigner, VerifierKey};

fn private_key() -> &'static RsaPrivateKey {
    static KEY: OnceLock<RsaPrivateKey> = OnceLock::new();
    // 1024 bits keeps debug-build key generation quick.
    KEY.get_or_init(|| RsaPrivateKey::new(&mut OsRng, 1024).expect("test key generation"))
}

pub(crate) fn prover_key() -> ProverKey {
    ProverKey::from(private_key().clone())
}

pub(crate) fn verifier_key() -> VerifierKey {
    prover_key().verifier_key()
}

pub(crate) fn signer() -> RsaSigner {
    RsaSigner::new(prover_key())
}
