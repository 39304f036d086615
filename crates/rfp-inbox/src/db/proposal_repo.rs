//! Vendor response repository: CRUD for the `vendor_responses` table.
//!
//! Every mutation is a read-modify-write of one full record inside a single
//! locked transaction, so a background analysis and a foreground decision on
//! the same proposal serialize instead of overwriting each other.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use super::{
    format_ts, parse_json, parse_ts, rfp_repo, to_json, Database, DatabaseError, Transition,
};
use crate::model::{
    DedupKey, EmailMetadata, ProposalAnalysis, ProposalStatus, Rfp, TransitionError,
    VendorResponse,
};

const COLUMNS: &str = "id, rfp_id, vendor_email, vendor_name, proposed_price, timeline,
     experience, approach, team_size, previous_work, notes, email_subject, email_body,
     email_html, received_at, is_read, attachments, analysis, analyzed_at, status,
     submitted_at, updated_at";

/// A raw vendor response row before decoding.
#[derive(Debug, Clone)]
struct ProposalRow {
    id: String,
    rfp_id: String,
    vendor_email: String,
    vendor_name: String,
    proposed_price: Option<f64>,
    timeline: Option<String>,
    experience: Option<String>,
    approach: Option<String>,
    team_size: Option<u32>,
    previous_work: Option<String>,
    notes: Option<String>,
    email_subject: Option<String>,
    email_body: Option<String>,
    email_html: Option<String>,
    received_at: Option<String>,
    is_read: bool,
    attachments: String,
    analysis: Option<String>,
    analyzed_at: Option<String>,
    status: String,
    submitted_at: String,
    updated_at: String,
}

impl ProposalRow {
    fn from_row(row: &rusqlite::Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            rfp_id: row.get(1)?,
            vendor_email: row.get(2)?,
            vendor_name: row.get(3)?,
            proposed_price: row.get(4)?,
            timeline: row.get(5)?,
            experience: row.get(6)?,
            approach: row.get(7)?,
            team_size: row.get(8)?,
            previous_work: row.get(9)?,
            notes: row.get(10)?,
            email_subject: row.get(11)?,
            email_body: row.get(12)?,
            email_html: row.get(13)?,
            received_at: row.get(14)?,
            is_read: row.get(15)?,
            attachments: row.get(16)?,
            analysis: row.get(17)?,
            analyzed_at: row.get(18)?,
            status: row.get(19)?,
            submitted_at: row.get(20)?,
            updated_at: row.get(21)?,
        })
    }

    fn decode(self) -> Result<VendorResponse, DatabaseError> {
        let status = self
            .status
            .parse::<ProposalStatus>()
            .map_err(|e| DatabaseError::Corrupt {
                column: "vendor_responses.status",
                reason: e.to_string(),
            })?;

        let email = match self.email_subject {
            Some(subject) => Some(EmailMetadata {
                subject,
                body: self.email_body.unwrap_or_default(),
                html: self.email_html,
                received_at: self
                    .received_at
                    .as_deref()
                    .map(|raw| parse_ts("vendor_responses.received_at", raw))
                    .transpose()?,
                is_read: self.is_read,
            }),
            None => None,
        };

        Ok(VendorResponse {
            attachments: parse_json("vendor_responses.attachments", &self.attachments)?,
            analysis: self
                .analysis
                .as_deref()
                .map(|raw| parse_json("vendor_responses.analysis", raw))
                .transpose()?,
            analyzed_at: self
                .analyzed_at
                .as_deref()
                .map(|raw| parse_ts("vendor_responses.analyzed_at", raw))
                .transpose()?,
            submitted_at: parse_ts("vendor_responses.submitted_at", &self.submitted_at)?,
            updated_at: parse_ts("vendor_responses.updated_at", &self.updated_at)?,
            id: self.id,
            rfp_id: self.rfp_id,
            vendor_email: self.vendor_email,
            vendor_name: self.vendor_name,
            proposed_price: self.proposed_price,
            timeline: self.timeline,
            experience: self.experience,
            approach: self.approach,
            team_size: self.team_size,
            previous_work: self.previous_work,
            notes: self.notes,
            email,
            status,
        })
    }
}

/// Outcome of accepting a proposal.
#[derive(Debug)]
pub enum AcceptOutcome {
    Accepted { proposal: VendorResponse, rfp: Rfp },
    ProposalNotFound,
    RfpNotFound,
    Refused(TransitionError),
}

fn query_one(
    conn: &Connection,
    filter: &str,
    params: impl rusqlite::Params,
) -> Result<Option<VendorResponse>, DatabaseError> {
    let row = conn
        .query_row(
            &format!("SELECT {} FROM vendor_responses WHERE {}", COLUMNS, filter),
            params,
            ProposalRow::from_row,
        )
        .optional()?;
    row.map(ProposalRow::decode).transpose()
}

fn query_many(
    conn: &Connection,
    tail: &str,
    params: impl rusqlite::Params,
) -> Result<Vec<VendorResponse>, DatabaseError> {
    let mut stmt = conn.prepare(&format!("SELECT {} FROM vendor_responses {}", COLUMNS, tail))?;
    let rows = stmt
        .query_map(params, ProposalRow::from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    rows.into_iter().map(ProposalRow::decode).collect()
}

fn insert_sql(on_conflict: &str) -> String {
    format!(
        "INSERT INTO vendor_responses ({})
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16,
                 ?17, ?18, ?19, ?20, ?21, ?22) {}",
        COLUMNS, on_conflict
    )
}

fn execute_insert(
    conn: &Connection,
    sql: &str,
    proposal: &VendorResponse,
) -> Result<usize, DatabaseError> {
    let attachments = to_json("vendor_responses.attachments", &proposal.attachments)?;
    let analysis = proposal
        .analysis
        .as_ref()
        .map(|a| to_json("vendor_responses.analysis", a))
        .transpose()?;
    let email = proposal.email.as_ref();

    let inserted = conn.execute(
        sql,
        params![
            proposal.id,
            proposal.rfp_id,
            proposal.vendor_email,
            proposal.vendor_name,
            proposal.proposed_price,
            proposal.timeline,
            proposal.experience,
            proposal.approach,
            proposal.team_size,
            proposal.previous_work,
            proposal.notes,
            email.map(|m| m.subject.as_str()),
            email.map(|m| m.body.as_str()),
            email.and_then(|m| m.html.as_deref()),
            email.and_then(|m| m.received_at.as_ref()).map(format_ts),
            email.map(|m| m.is_read).unwrap_or(false),
            attachments,
            analysis,
            proposal.analyzed_at.as_ref().map(format_ts),
            proposal.status.as_str(),
            format_ts(&proposal.submitted_at),
            format_ts(&proposal.updated_at),
        ],
    )?;
    Ok(inserted)
}

/// Inserts a proposal unconditionally (web-submitted path).
pub fn insert(db: &Database, proposal: &VendorResponse) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        execute_insert(conn, &insert_sql(""), proposal)?;
        Ok(())
    })
}

/// Inserts a mailbox-sourced proposal unless its dedup key already exists.
///
/// Returns `false` when another writer created the same key first.
pub fn insert_if_absent(db: &Database, proposal: &VendorResponse) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let inserted = execute_insert(conn, &insert_sql("ON CONFLICT DO NOTHING"), proposal)?;
        Ok(inserted > 0)
    })
}

/// Finds a proposal by id.
pub fn find_by_id(db: &Database, id: &str) -> Result<Option<VendorResponse>, DatabaseError> {
    db.with_conn(|conn| query_one(conn, "id = ?1", params![id]))
}

/// Finds the mailbox-sourced proposal stored under a dedup key.
pub fn find_by_dedup_key(
    db: &Database,
    key: &DedupKey,
) -> Result<Option<VendorResponse>, DatabaseError> {
    db.with_conn(|conn| {
        query_one(
            conn,
            "rfp_id = ?1 AND vendor_email = ?2 AND email_subject = ?3",
            params![key.rfp_id, key.vendor_email, key.subject],
        )
    })
}

/// Updates only the read flag of a proposal. Returns false if the id is unknown.
pub fn set_is_read(db: &Database, id: &str, is_read: bool) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let changed = conn.execute(
            "UPDATE vendor_responses SET is_read = ?1, updated_at = ?2 WHERE id = ?3",
            params![is_read, format_ts(&Utc::now()), id],
        )?;
        Ok(changed > 0)
    })
}

/// Lists every proposal, newest first.
pub fn list_all(db: &Database) -> Result<Vec<VendorResponse>, DatabaseError> {
    db.with_conn(|conn| query_many(conn, "ORDER BY submitted_at DESC, rowid DESC", []))
}

/// Lists the proposals of one RFP, newest first.
pub fn list_for_rfp(db: &Database, rfp_id: &str) -> Result<Vec<VendorResponse>, DatabaseError> {
    db.with_conn(|conn| {
        query_many(
            conn,
            "WHERE rfp_id = ?1 ORDER BY submitted_at DESC, rowid DESC",
            params![rfp_id],
        )
    })
}

/// Lists the proposals of one RFP that are in status `analyzed` and carry a result.
pub fn list_analyzed_for_rfp(
    db: &Database,
    rfp_id: &str,
) -> Result<Vec<VendorResponse>, DatabaseError> {
    db.with_conn(|conn| {
        query_many(
            conn,
            "WHERE rfp_id = ?1 AND status = 'analyzed' AND analysis IS NOT NULL
             ORDER BY submitted_at ASC, rowid ASC",
            params![rfp_id],
        )
    })
}

/// Ids of proposals still waiting for their first analysis, oldest first.
pub fn list_pending_ids(db: &Database) -> Result<Vec<String>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT id FROM vendor_responses WHERE status = 'pending'
             ORDER BY submitted_at ASC, rowid ASC",
        )?;
        let ids = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ids)
    })
}

/// Writes an analysis onto a proposal and advances its status.
///
/// Returns the updated record, or `None` if the proposal no longer exists.
pub fn record_analysis(
    db: &Database,
    id: &str,
    analysis: &ProposalAnalysis,
    analyzed_at: DateTime<Utc>,
) -> Result<Option<VendorResponse>, DatabaseError> {
    let encoded = to_json("vendor_responses.analysis", analysis)?;
    db.with_conn(|conn| {
        let tx = conn.transaction()?;
        let Some(mut proposal) = query_one(&tx, "id = ?1", params![id])? else {
            return Ok(None);
        };
        proposal.analysis = Some(analysis.clone());
        proposal.analyzed_at = Some(analyzed_at);
        proposal.status = proposal.status.after_analysis();
        proposal.updated_at = Utc::now();

        tx.execute(
            "UPDATE vendor_responses
             SET analysis = ?1, analyzed_at = ?2, status = ?3, updated_at = ?4
             WHERE id = ?5",
            params![
                encoded,
                format_ts(&analyzed_at),
                proposal.status.as_str(),
                format_ts(&proposal.updated_at),
                id,
            ],
        )?;
        tx.commit()?;
        Ok(Some(proposal))
    })
}

/// Applies a status transition to a proposal under the connection lock.
pub fn transition<F>(
    db: &Database,
    id: &str,
    step: F,
) -> Result<Transition<VendorResponse>, DatabaseError>
where
    F: FnOnce(ProposalStatus) -> Result<ProposalStatus, TransitionError>,
{
    db.with_conn(|conn| {
        let tx = conn.transaction()?;
        let Some(mut proposal) = query_one(&tx, "id = ?1", params![id])? else {
            return Ok(Transition::NotFound);
        };
        match step(proposal.status) {
            Ok(next) => {
                proposal.status = next;
                proposal.updated_at = Utc::now();
                set_status_in(&tx, &proposal)?;
                tx.commit()?;
                Ok(Transition::Applied(proposal))
            }
            Err(refusal) => Ok(Transition::Refused(refusal)),
        }
    })
}

/// Accepts a proposal and its RFP together.
///
/// Both guards are checked against the stored state inside one transaction,
/// so a second acceptance for the same RFP is always refused.
pub fn accept(db: &Database, id: &str) -> Result<AcceptOutcome, DatabaseError> {
    db.with_conn(|conn| {
        let tx = conn.transaction()?;
        let Some(mut proposal) = query_one(&tx, "id = ?1", params![id])? else {
            return Ok(AcceptOutcome::ProposalNotFound);
        };
        let Some(mut rfp) = rfp_repo::find_in(&tx, &proposal.rfp_id)? else {
            return Ok(AcceptOutcome::RfpNotFound);
        };

        let rfp_next = match rfp.status.accept() {
            Ok(next) => next,
            Err(refusal) => return Ok(AcceptOutcome::Refused(refusal)),
        };
        let proposal_next = match proposal.status.accept() {
            Ok(next) => next,
            Err(refusal) => return Ok(AcceptOutcome::Refused(refusal)),
        };

        proposal.status = proposal_next;
        proposal.updated_at = Utc::now();
        rfp.status = rfp_next;
        set_status_in(&tx, &proposal)?;
        rfp_repo::set_status_in(&tx, &rfp.id, rfp.status)?;
        tx.commit()?;

        Ok(AcceptOutcome::Accepted { proposal, rfp })
    })
}

fn set_status_in(conn: &Connection, proposal: &VendorResponse) -> Result<(), DatabaseError> {
    conn.execute(
        "UPDATE vendor_responses SET status = ?1, updated_at = ?2 WHERE id = ?3",
        params![
            proposal.status.as_str(),
            format_ts(&proposal.updated_at),
            proposal.id
        ],
    )?;
    Ok(())
}
