//! Portal scraping as a capability: callers supply one [`RecordFetcher`] per
//! logged-in session and [`collect`] fans the IDs out across them.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::{Duration, Instant};

use recongrid_core::{CellValue, Record, RecordSet};

use crate::model::MatchStatus;
use crate::progress::Progress;

/// Field name → extracted text for one record.
pub type PartialRecord = HashMap<String, String>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    Found(PartialRecord),
    /// The portal returned no page for this ID.
    NotFound,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    Timeout,
    Session(String),
    Cancelled,
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timeout => write!(f, "timed out"),
            Self::Session(msg) => write!(f, "session error: {msg}"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl std::error::Error for FetchError {}

/// One portal session.
pub trait RecordFetcher: Send {
    fn fetch_record(&mut self, id: &str, fields: &[String]) -> Result<FetchOutcome, FetchError>;
}

/// Login for one session. The password never appears in debug output.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// Open one fetcher per credential. A failed login is logged and skipped;
/// the call fails only when no session could be opened.
pub fn open_sessions<F>(
    credentials: &[Credential],
    mut login: F,
) -> Result<Vec<Box<dyn RecordFetcher>>, FetchError>
where
    F: FnMut(&Credential) -> Result<Box<dyn RecordFetcher>, FetchError>,
{
    let mut sessions = Vec::with_capacity(credentials.len());
    let mut last_err = None;
    for cred in credentials {
        match login(cred) {
            Ok(fetcher) => sessions.push(fetcher),
            Err(e) => {
                log::warn!("login failed for {}: {e}", cred.username);
                last_err = Some(e);
            }
        }
    }
    match (sessions.is_empty(), last_err) {
        (true, Some(e)) => Err(e),
        (true, None) => Err(FetchError::Session("no credentials supplied".into())),
        _ => Ok(sessions),
    }
}

#[derive(Debug, Clone)]
pub struct CollectOptions {
    /// Column the IDs are written to.
    pub id_column: String,
    /// Overall deadline; IDs not started by then fail with `Timeout`.
    pub timeout: Option<Duration>,
    /// Call the checkpoint callback every N completed IDs. Zero disables it.
    pub checkpoint_every: usize,
    pub cancel: Arc<AtomicBool>,
}

impl Default for CollectOptions {
    fn default() -> Self {
        Self {
            id_column: "ROID".into(),
            timeout: None,
            checkpoint_every: 100,
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ScrapeResult {
    pub table: RecordSet,
    pub no_page_data: Vec<String>,
    /// (id, reason)
    pub failed: Vec<(String, String)>,
}

impl ScrapeResult {
    /// Fold a later scrape of (some of) the same IDs into this one. A row in
    /// `newer` replaces the older row for that ID wholesale.
    pub fn merge_overwrite(&mut self, newer: ScrapeResult) {
        let key = self.id_column(&newer);
        for col in newer.table.columns() {
            self.table.add_column(col.clone());
        }

        let mut index: HashMap<String, usize> = self
            .table
            .rows()
            .iter()
            .enumerate()
            .map(|(i, r)| (r.text(&key), i))
            .collect();
        let mut resolved = HashSet::new();
        for row in newer.table.into_rows() {
            let id = row.text(&key);
            resolved.insert(id.clone());
            match index.get(&id) {
                Some(&i) => self.table.rows_mut()[i] = row,
                None => {
                    index.insert(id, self.table.len());
                    self.table.push(row);
                }
            }
        }

        let retried: HashSet<&str> = newer
            .failed
            .iter()
            .map(|(id, _)| id.as_str())
            .chain(newer.no_page_data.iter().map(String::as_str))
            .collect();
        self.failed
            .retain(|(id, _)| !resolved.contains(id) && !retried.contains(id.as_str()));
        self.no_page_data
            .retain(|id| !resolved.contains(id) && !retried.contains(id.as_str()));
        self.failed.extend(newer.failed);
        self.no_page_data.extend(newer.no_page_data);
    }

    fn id_column(&self, newer: &ScrapeResult) -> String {
        self.table
            .columns()
            .first()
            .or_else(|| newer.table.columns().first())
            .cloned()
            .unwrap_or_default()
    }
}

/// Unique non-empty IDs of rows that ended `StillUnmatched`, in table order.
pub fn ids_to_scrape(table: &RecordSet, statuses: &[MatchStatus], column: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    table
        .rows()
        .iter()
        .zip(statuses)
        .filter(|(_, s)| **s == MatchStatus::StillUnmatched)
        .map(|(r, _)| r.text(column))
        .filter(|id| !id.is_empty() && seen.insert(id.clone()))
        .collect()
}

type WorkerResult = (usize, Result<FetchOutcome, FetchError>);

/// Fetch `fields` for every ID, one worker thread per fetcher pulling from
/// a shared queue. Rows come back in input order; failures are listed, never
/// fatal.
pub fn collect(
    ids: &[String],
    fields: &[String],
    fetchers: Vec<Box<dyn RecordFetcher>>,
    options: &CollectOptions,
    progress: &mut dyn Progress,
    checkpoint: &mut dyn FnMut(&RecordSet),
) -> ScrapeResult {
    let mut seen = HashSet::new();
    let ids: Vec<&String> = ids.iter().filter(|id| seen.insert(id.as_str())).collect();

    let mut columns = vec![options.id_column.clone()];
    columns.extend(fields.iter().filter(|f| **f != options.id_column).cloned());

    progress.begin(ids.len());
    let mut result = ScrapeResult {
        table: RecordSet::new("scraper", columns.clone()),
        ..ScrapeResult::default()
    };
    if ids.is_empty() || fetchers.is_empty() {
        if fetchers.is_empty() && !ids.is_empty() {
            log::warn!("no fetchers supplied, {} id(s) not scraped", ids.len());
            result.failed = ids.iter().map(|id| ((*id).clone(), "no session".to_string())).collect();
        }
        progress.finish();
        return result;
    }

    let deadline = options.timeout.map(|t| Instant::now() + t);
    let next = AtomicUsize::new(0);
    let (tx, rx) = mpsc::channel::<WorkerResult>();
    let mut rows: Vec<Option<Record>> = vec![None; ids.len()];
    let mut completed = 0;

    thread::scope(|scope| {
        for (worker, mut fetcher) in fetchers.into_iter().enumerate() {
            let tx = tx.clone();
            let (ids, next) = (&ids, &next);
            let cancel = &options.cancel;
            scope.spawn(move || loop {
                let i = next.fetch_add(1, Ordering::Relaxed);
                let Some(id) = ids.get(i) else {
                    break;
                };
                let outcome = if cancel.load(Ordering::Relaxed) {
                    Err(FetchError::Cancelled)
                } else if deadline.is_some_and(|d| Instant::now() >= d) {
                    Err(FetchError::Timeout)
                } else {
                    log::debug!("worker {worker}: fetching {id}");
                    fetcher.fetch_record(id, fields)
                };
                if tx.send((i, outcome)).is_err() {
                    break;
                }
            });
        }
        drop(tx);

        for (i, outcome) in rx {
            let id = ids[i];
            match outcome {
                Ok(FetchOutcome::Found(values)) => {
                    let mut record = Record::new();
                    record.set(options.id_column.clone(), id.as_str());
                    for col in columns.iter().skip(1) {
                        let value = values.get(col).cloned().unwrap_or_default();
                        record.set(col.clone(), CellValue::Text(value));
                    }
                    rows[i] = Some(record);
                }
                Ok(FetchOutcome::NotFound) => {
                    log::debug!("{id}: no page data");
                    result.no_page_data.push(id.clone());
                }
                Err(e) => {
                    log::warn!("{id}: {e}");
                    result.failed.push((id.clone(), e.to_string()));
                }
            }
            completed += 1;
            progress.item_done(id);

            if options.checkpoint_every > 0 && completed % options.checkpoint_every == 0 {
                let partial = RecordSet::with_rows(
                    "scraper",
                    columns.clone(),
                    rows.iter().flatten().cloned().collect(),
                );
                progress.log(&format!("checkpoint: {completed} of {} done", ids.len()));
                checkpoint(&partial);
            }
        }
    });

    for row in rows.into_iter().flatten() {
        result.table.push(row);
    }
    log::info!(
        "scrape: {} found, {} without page data, {} failed",
        result.table.len(),
        result.no_page_data.len(),
        result.failed.len()
    );
    progress.finish();
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::NullProgress;

    struct FakePortal {
        pages: HashMap<String, PartialRecord>,
        broken: HashSet<String>,
        cancel_after: Option<(usize, Arc<AtomicBool>)>,
        calls: usize,
    }

    impl FakePortal {
        fn new(pages: &[(&str, &str)]) -> Self {
            let pages = pages
                .iter()
                .map(|(id, status)| {
                    let mut rec = PartialRecord::new();
                    rec.insert("AP status".to_string(), status.to_string());
                    (id.to_string(), rec)
                })
                .collect();
            Self {
                pages,
                broken: HashSet::new(),
                cancel_after: None,
                calls: 0,
            }
        }
    }

    impl RecordFetcher for FakePortal {
        fn fetch_record(&mut self, id: &str, _fields: &[String]) -> Result<FetchOutcome, FetchError> {
            self.calls += 1;
            if let Some((n, flag)) = &self.cancel_after {
                if self.calls >= *n {
                    flag.store(true, Ordering::Relaxed);
                }
            }
            if self.broken.contains(id) {
                return Err(FetchError::Session("logged out".into()));
            }
            Ok(self
                .pages
                .get(id)
                .cloned()
                .map(FetchOutcome::Found)
                .unwrap_or(FetchOutcome::NotFound))
        }
    }

    #[derive(Default)]
    struct Recorder {
        total: usize,
        done: Vec<String>,
        finished: bool,
    }

    impl Progress for Recorder {
        fn begin(&mut self, total: usize) {
            self.total = total;
        }
        fn item_done(&mut self, id: &str) {
            self.done.push(id.to_string());
        }
        fn finish(&mut self) {
            self.finished = true;
        }
    }

    fn ids(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    fn fields() -> Vec<String> {
        ids(&["AP status", "Status in api"])
    }

    #[test]
    fn collects_in_input_order_across_sessions() {
        let pages = [("R1", "paid"), ("R2", "open"), ("R4", "paid")];
        let fetchers: Vec<Box<dyn RecordFetcher>> =
            vec![Box::new(FakePortal::new(&pages)), Box::new(FakePortal::new(&pages))];
        let mut progress = Recorder::default();
        let mut checkpoints = 0;

        let result = collect(
            &ids(&["R1", "R2", "R3", "R4", "R2"]),
            &fields(),
            fetchers,
            &CollectOptions { checkpoint_every: 2, ..CollectOptions::default() },
            &mut progress,
            &mut |_| checkpoints += 1,
        );

        assert_eq!(result.table.columns(), &ids(&["ROID", "AP status", "Status in api"]));
        assert_eq!(result.table.rows().iter().map(|r| r.text("ROID")).collect::<Vec<_>>(), ids(&["R1", "R2", "R4"]));
        assert_eq!(result.table.cell(2, "AP status"), &CellValue::from("paid"));
        assert_eq!(result.table.cell(0, "Status in api"), &CellValue::from(""));
        assert_eq!(result.no_page_data, ids(&["R3"]));
        assert!(result.failed.is_empty());
        assert_eq!(progress.total, 4);
        assert_eq!(progress.done.len(), 4);
        assert!(progress.finished);
        assert_eq!(checkpoints, 2);
    }

    #[test]
    fn session_errors_are_listed_not_fatal() {
        let mut portal = FakePortal::new(&[("R1", "paid")]);
        portal.broken.insert("R2".into());
        let result = collect(
            &ids(&["R1", "R2"]),
            &fields(),
            vec![Box::new(portal)],
            &CollectOptions::default(),
            &mut NullProgress,
            &mut |_| {},
        );
        assert_eq!(result.table.len(), 1);
        assert_eq!(result.failed, vec![("R2".to_string(), "session error: logged out".to_string())]);
    }

    #[test]
    fn cancellation_fails_remaining_ids() {
        let options = CollectOptions::default();
        let mut portal = FakePortal::new(&[("R1", "a"), ("R2", "b"), ("R3", "c")]);
        portal.cancel_after = Some((1, Arc::clone(&options.cancel)));
        let result = collect(
            &ids(&["R1", "R2", "R3"]),
            &fields(),
            vec![Box::new(portal)],
            &options,
            &mut NullProgress,
            &mut |_| {},
        );
        assert_eq!(result.table.len(), 1);
        assert_eq!(result.failed.len(), 2);
        assert!(result.failed.iter().all(|(_, why)| why == "cancelled"));
    }

    #[test]
    fn expired_deadline_times_out_everything() {
        let result = collect(
            &ids(&["R1", "R2"]),
            &fields(),
            vec![Box::new(FakePortal::new(&[("R1", "a")]))],
            &CollectOptions { timeout: Some(Duration::ZERO), ..CollectOptions::default() },
            &mut NullProgress,
            &mut |_| {},
        );
        assert!(result.table.is_empty());
        assert!(result.failed.iter().all(|(_, why)| why == "timed out"));
    }

    #[test]
    fn merge_overwrite_replaces_rows_per_id() {
        let run = |pages: &[(&str, &str)], wanted: &[&str]| {
            collect(
                &ids(wanted),
                &fields(),
                vec![Box::new(FakePortal::new(pages))],
                &CollectOptions::default(),
                &mut NullProgress,
                &mut |_| {},
            )
        };
        let mut first = run(&[("R1", "open")], &["R1", "R2"]);
        assert_eq!(first.no_page_data, ids(&["R2"]));

        let second = run(&[("R1", "paid"), ("R2", "paid")], &["R1", "R2"]);
        first.merge_overwrite(second);

        assert_eq!(first.table.len(), 2);
        assert_eq!(first.table.cell(0, "AP status"), &CellValue::from("paid"));
        assert_eq!(first.table.cell(1, "ROID"), &CellValue::from("R2"));
        assert!(first.no_page_data.is_empty());
    }

    fn login(pages: &'static [(&'static str, &'static str)]) -> impl FnMut(&Credential) -> Result<Box<dyn RecordFetcher>, FetchError> {
        move |cred| {
            if cred.password == "hunter2" {
                Ok(Box::new(FakePortal::new(pages)) as Box<dyn RecordFetcher>)
            } else {
                Err(FetchError::Session(format!("bad password for {}", cred.username)))
            }
        }
    }

    fn cred(user: &str, password: &str) -> Credential {
        Credential { username: user.into(), password: password.into() }
    }

    #[test]
    fn one_session_per_working_credential() {
        const PAGES: &[(&str, &str)] = &[("R1", "paid"), ("R2", "open")];
        let creds = [cred("ops", "hunter2"), cred("audit", "wrong"), cred("lead", "hunter2")];
        let sessions = open_sessions(&creds, login(PAGES)).unwrap();
        assert_eq!(sessions.len(), 2);

        let result = collect(
            &ids(&["R1", "R2"]),
            &fields(),
            sessions,
            &CollectOptions::default(),
            &mut NullProgress,
            &mut |_| {},
        );
        assert_eq!(result.table.len(), 2);
    }

    #[test]
    fn no_working_credential_is_an_error() {
        const PAGES: &[(&str, &str)] = &[];
        let err = open_sessions(&[cred("audit", "wrong")], login(PAGES)).err().unwrap();
        assert_eq!(err, FetchError::Session("bad password for audit".into()));
        assert!(open_sessions(&[], login(PAGES)).is_err());
    }

    #[test]
    fn credential_debug_hides_password() {
        let cred = Credential { username: "ops".into(), password: "hunter2".into() };
        let shown = format!("{cred:?}");
        assert!(shown.contains("ops"));
        assert!(!shown.contains("hunter2"));
    }

    #[test]
    fn still_unmatched_ids_are_unique() {
        let table = RecordSet::with_rows(
            "final",
            ids(&["ROID"]),
            ["R1", "R2", "R1", ""].iter().map(|r| Record::from_pairs([("ROID", *r)])).collect(),
        );
        let statuses = [
            MatchStatus::StillUnmatched,
            MatchStatus::MatchedPrimary,
            MatchStatus::StillUnmatched,
            MatchStatus::StillUnmatched,
        ];
        assert_eq!(ids_to_scrape(&table, &statuses, "ROID"), ids(&["R1"]));
    }
}
