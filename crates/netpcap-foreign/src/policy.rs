//! What a session does about symbols it could not bind.

use crate::error::SessionFault;

/// Decides, when a session closes, whether its missing symbols are fatal.
///
/// Runs exactly once per session with the unbound downcall and upcall names
/// in the order they were requested. Closures with the same shape implement
/// the trait.
pub trait MissingSymbolsPolicy: Send {
    fn on_missing_symbols(
        &self,
        session: &str,
        downcalls: &[String],
        upcalls: &[String],
    ) -> Result<(), SessionFault>;
}

impl<F> MissingSymbolsPolicy for F
where
    F: Fn(&str, &[String], &[String]) -> Result<(), SessionFault> + Send,
{
    fn on_missing_symbols(
        &self,
        session: &str,
        downcalls: &[String],
        upcalls: &[String],
    ) -> Result<(), SessionFault> {
        self(session, downcalls, upcalls)
    }
}

/// Fails when any upcall is missing; missing downcalls are only logged.
///
/// Downcalls may legitimately be absent from older native libraries, but a
/// callback the library cannot reach is always a programming error.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequireUpcalls;

impl MissingSymbolsPolicy for RequireUpcalls {
    fn on_missing_symbols(
        &self,
        session: &str,
        downcalls: &[String],
        upcalls: &[String],
    ) -> Result<(), SessionFault> {
        log_downcalls(session, downcalls);
        if upcalls.is_empty() {
            return Ok(());
        }
        Err(SessionFault::MissingUpcalls {
            session: session.to_string(),
            methods: upcalls.to_vec(),
        })
    }
}

/// Fails on any missing symbol.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequireAll;

impl MissingSymbolsPolicy for RequireAll {
    fn on_missing_symbols(
        &self,
        session: &str,
        downcalls: &[String],
        upcalls: &[String],
    ) -> Result<(), SessionFault> {
        if downcalls.is_empty() && upcalls.is_empty() {
            return Ok(());
        }
        Err(SessionFault::MissingSymbols {
            session: session.to_string(),
            downcalls: downcalls.to_vec(),
            upcalls: upcalls.to_vec(),
        })
    }
}

/// Never fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct IgnoreMissing;

impl MissingSymbolsPolicy for IgnoreMissing {
    fn on_missing_symbols(
        &self,
        session: &str,
        downcalls: &[String],
        upcalls: &[String],
    ) -> Result<(), SessionFault> {
        log_downcalls(session, downcalls);
        if !upcalls.is_empty() {
            log::warn!("{session}: missing upcalls {upcalls:?}");
        }
        Ok(())
    }
}

fn log_downcalls(session: &str, downcalls: &[String]) {
    if !downcalls.is_empty() {
        log::warn!("{session}: missing native symbols {downcalls:?}");
    }
}
