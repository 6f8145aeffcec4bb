//! BIP-340 Schnorr signatures over secp256k1, as used by nostr notes.
//!
//! The signed message is the 32-byte note id itself (no further hashing),
//! so both directions go through the prehash entry points of `k256`.

use k256::schnorr::signature::hazmat::{PrehashSigner, PrehashVerifier};
use k256::schnorr::{Signature, SigningKey, VerifyingKey};
use crate::core::error::{Error, ErrorKind, IngestError, Result};
use crate::core::note::Note;
use crate::core::types::{NoteId, Pubkey, Sig};

/// Verify `note.sig` against `note.pubkey` and `note.id`.
///
/// The id is trusted here; callers check it against the note contents first.
pub fn verify_note_signature(note: &Note) -> std::result::Result<(), IngestError> {
    verify_signature(&note.pubkey, &note.id, &note.sig)
}

pub fn verify_signature(
    pubkey: &Pubkey,
    id: &NoteId,
    sig: &Sig,
) -> std::result::Result<(), IngestError> {
    let key = VerifyingKey::from_bytes(pubkey.as_bytes())
        .map_err(|_| IngestError::InvalidSignature)?;
    let signature = Signature::try_from(&sig.as_bytes()[..])
        .map_err(|_| IngestError::InvalidSignature)?;

    key.verify_prehash(id.as_bytes(), &signature)
        .map_err(|_| IngestError::InvalidSignature)
}

/// Signing key for producing notes, used by importers and tests.
pub struct NoteSigner {
    signing_key: SigningKey,
}

impl NoteSigner {
    pub fn from_secret(secret: &[u8; 32]) -> Result<Self> {
        let signing_key = SigningKey::from_bytes(secret).map_err(|e| {
            Error::new(ErrorKind::InvalidArgument, format!("invalid secret key: {}", e))
        })?;
        Ok(NoteSigner { signing_key })
    }

    pub fn pubkey(&self) -> Pubkey {
        Pubkey(self.signing_key.verifying_key().to_bytes().into())
    }

    pub fn sign_id(&self, id: &NoteId) -> Result<Sig> {
        let signature: Signature = self.signing_key.sign_prehash(id.as_bytes()).map_err(|e| {
            Error::new(ErrorKind::Internal, format!("signing failed: {}", e))
        })?;
        Ok(Sig(signature.to_bytes()))
    }

    /// Build, hash and sign a complete note.
    pub fn sign_note(
        &self,
        created_at: u64,
        kind: u32,
        tags: Vec<Vec<String>>,
        content: impl Into<String>,
    ) -> Result<Note> {
        let pubkey = self.pubkey();
        let content = content.into();
        let id = Note::compute_id(&pubkey, created_at, kind, &tags, &content)?;
        let sig = self.sign_id(&id)?;

        Ok(Note {
            id,
            pubkey,
            created_at,
            kind,
            tags,
            content,
            sig,
        })
    }
}
