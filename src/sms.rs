//! Store in memoria dei codici di verifica SMS
//!
//! Ogni numero di telefono (normalizzato) ha al più un codice attivo.
//! Un codice vale 5 minuti, ammette 3 tentativi e non può essere
//! rigenerato prima di 60 secondi. La verifica riuscita cancella il codice.
//! Un task in background rimuove periodicamente i codici scaduti.

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use rand::Rng;
use std::sync::Arc;
use thiserror::Error;
use tokio::time;
use tracing::{debug, info, instrument, warn};

pub const CODE_LENGTH: usize = 6;
pub const CODE_TTL_SECS: i64 = 5 * 60;
pub const MAX_ATTEMPTS: u32 = 3;
pub const RESEND_COOLDOWN_SECS: i64 = 60;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SmsError {
    #[error("please wait {retry_after_secs} seconds before requesting a new code")]
    Cooldown { retry_after_secs: i64 },
    #[error("no verification code for this phone number, request a new one")]
    NotFound,
    #[error("verification code expired, request a new one")]
    Expired,
    #[error("too many attempts, request a new code")]
    TooManyAttempts,
    #[error("wrong code, {remaining} attempts left")]
    Mismatch { remaining: u32 },
}

#[derive(Debug, Clone)]
pub struct VerificationEntry {
    pub code: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub attempts: u32,
}

impl VerificationEntry {
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

/// Risultato di una emissione riuscita
#[derive(Debug, Clone)]
pub struct IssuedCode {
    pub phone: String,
    pub code: String,
    pub can_resend_at: DateTime<Utc>,
}

/// Rimuove tutto ciò che non è una cifra; oltre le 11 cifre tiene le ultime 11
/// (prefisso internazionale scartato).
pub fn normalize_phone(raw: &str) -> String {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.len() > 11 {
        digits[digits.len() - 11..].to_string()
    } else {
        digits
    }
}

#[derive(Default)]
pub struct VerificationStore {
    codes: DashMap<String, VerificationEntry>,
}

impl VerificationStore {
    pub fn new() -> Self {
        Self {
            codes: DashMap::new(),
        }
    }

    fn generate_code() -> String {
        let n: u32 = rand::rng().random_range(0..1_000_000);
        format!("{:0width$}", n, width = CODE_LENGTH)
    }

    #[instrument(skip(self))]
    pub fn issue(&self, phone: &str, now: DateTime<Utc>) -> Result<IssuedCode, SmsError> {
        let phone = normalize_phone(phone);
        let cooldown = Duration::seconds(RESEND_COOLDOWN_SECS);

        match self.codes.entry(phone.clone()) {
            Entry::Occupied(mut occupied) => {
                let existing = occupied.get();
                if now - existing.created_at < cooldown {
                    let can_resend_at = existing.created_at + cooldown;
                    // arrotondato per eccesso al secondo
                    let remaining_ms = (can_resend_at - now).num_milliseconds();
                    let retry_after_secs = (remaining_ms + 999) / 1000;
                    warn!("Resend requested during cooldown ({}s left)", retry_after_secs);
                    return Err(SmsError::Cooldown { retry_after_secs });
                }
                let entry = Self::fresh_entry(now);
                let code = entry.code.clone();
                occupied.insert(entry);
                debug!("Verification code replaced");
                Ok(IssuedCode {
                    phone,
                    code,
                    can_resend_at: now + cooldown,
                })
            }
            Entry::Vacant(vacant) => {
                let entry = Self::fresh_entry(now);
                let code = entry.code.clone();
                vacant.insert(entry);
                debug!("Verification code issued");
                Ok(IssuedCode {
                    phone,
                    code,
                    can_resend_at: now + cooldown,
                })
            }
        }
    }

    fn fresh_entry(now: DateTime<Utc>) -> VerificationEntry {
        VerificationEntry {
            code: Self::generate_code(),
            created_at: now,
            expires_at: now + Duration::seconds(CODE_TTL_SECS),
            attempts: 0,
        }
    }

    #[instrument(skip(self, code))]
    pub fn verify(&self, phone: &str, code: &str, now: DateTime<Utc>) -> Result<(), SmsError> {
        let phone = normalize_phone(phone);

        let Entry::Occupied(mut occupied) = self.codes.entry(phone) else {
            return Err(SmsError::NotFound);
        };

        if occupied.get().is_expired(now) {
            occupied.remove();
            return Err(SmsError::Expired);
        }

        if occupied.get().attempts >= MAX_ATTEMPTS {
            occupied.remove();
            return Err(SmsError::TooManyAttempts);
        }

        let entry = occupied.get_mut();
        entry.attempts += 1;

        if entry.code != code {
            let remaining = MAX_ATTEMPTS - entry.attempts;
            warn!("Wrong verification code, {} attempts left", remaining);
            return Err(SmsError::Mismatch { remaining });
        }

        occupied.remove();
        info!("Phone number verified");
        Ok(())
    }

    pub fn clear(&self, phone: &str) {
        self.codes.remove(&normalize_phone(phone));
    }

    pub fn len(&self) -> usize {
        self.codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }

    /// Rimuove i codici scaduti e ritorna quanti ne ha rimossi
    pub fn purge_expired(&self, now: DateTime<Utc>) -> usize {
        let before = self.codes.len();
        self.codes.retain(|_, entry| !entry.is_expired(now));
        before.saturating_sub(self.codes.len())
    }
}

/// Task in background che pulisce i codici scaduti ogni `interval_secs` secondi
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use xiaoyuan_server::sms::{VerificationStore, start_sms_sweeper};
///
/// #[tokio::main]
/// async fn main() {
///     let store = Arc::new(VerificationStore::new());
///     tokio::spawn(start_sms_sweeper(store, 60));
/// }
/// ```
pub async fn start_sms_sweeper(store: Arc<VerificationStore>, interval_secs: u64) {
    info!("Starting SMS code sweeper with interval: {} seconds", interval_secs);

    let mut interval = time::interval(std::time::Duration::from_secs(interval_secs));

    // Salta il primo tick che avviene immediatamente
    interval.tick().await;

    loop {
        interval.tick().await;
        let purged = store.purge_expired(Utc::now());
        if purged > 0 {
            info!("Purged {} expired verification codes ({} left)", purged, store.len());
        } else {
            debug!("No expired verification codes ({} active)", store.len());
        }
    }
}
