//! RFP repository: the `rfps` table and its invited-vendor list in `rfp_vendors`.

use rusqlite::{params, Connection, OptionalExtension};

use super::{
    format_ts, parse_date, parse_json, parse_ts, to_json, Database, DatabaseError, Transition,
};
use crate::model::{Rfp, RfpStatus, RfpSummary, TransitionError};

const RFP_COLUMNS: &str = "id, company_name, contact_person, contact_email, phone, project_title,
     project_description, budget, deadline, requirements, attachments, status, created_at";

/// A raw RFP row before decoding.
#[derive(Debug, Clone)]
struct RfpRow {
    id: String,
    company_name: String,
    contact_person: String,
    contact_email: Option<String>,
    phone: Option<String>,
    project_title: String,
    project_description: String,
    budget: f64,
    deadline: String,
    requirements: String,
    attachments: String,
    status: String,
    created_at: String,
}

impl RfpRow {
    fn from_row(row: &rusqlite::Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            company_name: row.get(1)?,
            contact_person: row.get(2)?,
            contact_email: row.get(3)?,
            phone: row.get(4)?,
            project_title: row.get(5)?,
            project_description: row.get(6)?,
            budget: row.get(7)?,
            deadline: row.get(8)?,
            requirements: row.get(9)?,
            attachments: row.get(10)?,
            status: row.get(11)?,
            created_at: row.get(12)?,
        })
    }

    fn into_rfp(self, invited_vendors: Vec<String>) -> Result<Rfp, DatabaseError> {
        let status = self.status.parse::<RfpStatus>().map_err(|e| DatabaseError::Corrupt {
            column: "rfps.status",
            reason: e.to_string(),
        })?;
        Ok(Rfp {
            deadline: parse_date("rfps.deadline", &self.deadline)?,
            attachments: parse_json("rfps.attachments", &self.attachments)?,
            created_at: parse_ts("rfps.created_at", &self.created_at)?,
            id: self.id,
            company_name: self.company_name,
            contact_person: self.contact_person,
            contact_email: self.contact_email,
            phone: self.phone,
            project_title: self.project_title,
            project_description: self.project_description,
            budget: self.budget,
            requirements: self.requirements,
            invited_vendors,
            status,
        })
    }
}

fn load_vendors(conn: &Connection, rfp_id: &str) -> Result<Vec<String>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT vendor_email FROM rfp_vendors WHERE rfp_id = ?1 ORDER BY position ASC",
    )?;
    let vendors = stmt
        .query_map(params![rfp_id], |row| row.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(vendors)
}

fn hydrate(conn: &Connection, row: RfpRow) -> Result<Rfp, DatabaseError> {
    let vendors = load_vendors(conn, &row.id)?;
    row.into_rfp(vendors)
}

/// Inserts an RFP and its invited vendors in one transaction.
///
/// The vendor list is expected to be normalized already (see `Rfp::from_new`).
pub fn insert(db: &Database, rfp: &Rfp) -> Result<(), DatabaseError> {
    let attachments = to_json("rfps.attachments", &rfp.attachments)?;
    db.with_conn(|conn| {
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT INTO rfps (id, company_name, contact_person, contact_email, phone,
             project_title, project_description, budget, deadline, requirements,
             attachments, status, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
            params![
                rfp.id,
                rfp.company_name,
                rfp.contact_person,
                rfp.contact_email,
                rfp.phone,
                rfp.project_title,
                rfp.project_description,
                rfp.budget,
                rfp.deadline.format("%Y-%m-%d").to_string(),
                rfp.requirements,
                attachments,
                rfp.status.as_str(),
                format_ts(&rfp.created_at),
            ],
        )?;
        for (position, vendor) in rfp.invited_vendors.iter().enumerate() {
            tx.execute(
                "INSERT OR IGNORE INTO rfp_vendors (rfp_id, position, vendor_email)
                 VALUES (?1, ?2, ?3)",
                params![rfp.id, position as i64, vendor],
            )?;
        }
        tx.commit()?;
        Ok(())
    })
}

/// Finds an RFP by id.
pub fn find_by_id(db: &Database, id: &str) -> Result<Option<Rfp>, DatabaseError> {
    db.with_conn(|conn| find_in(conn, id))
}

pub(super) fn find_in(conn: &Connection, id: &str) -> Result<Option<Rfp>, DatabaseError> {
    let row = conn
        .query_row(
            &format!("SELECT {} FROM rfps WHERE id = ?1", RFP_COLUMNS),
            params![id],
            RfpRow::from_row,
        )
        .optional()?;
    row.map(|r| hydrate(conn, r)).transpose()
}

pub(super) fn set_status_in(
    conn: &Connection,
    id: &str,
    status: RfpStatus,
) -> Result<(), DatabaseError> {
    conn.execute(
        "UPDATE rfps SET status = ?1 WHERE id = ?2",
        params![status.as_str(), id],
    )?;
    Ok(())
}

/// Finds the RFP a sender most plausibly replies to.
///
/// Exact match on the normalized address; the most recently created RFP wins
/// regardless of its status.
pub fn find_latest_for_vendor(
    db: &Database,
    vendor_email: &str,
) -> Result<Option<Rfp>, DatabaseError> {
    db.with_conn(|conn| {
        let row = conn
            .query_row(
                "SELECT r.id, r.company_name, r.contact_person, r.contact_email, r.phone,
                        r.project_title, r.project_description, r.budget, r.deadline,
                        r.requirements, r.attachments, r.status, r.created_at
                 FROM rfps r
                 JOIN rfp_vendors v ON v.rfp_id = r.id
                 WHERE v.vendor_email = ?1
                 ORDER BY r.created_at DESC, r.rowid DESC
                 LIMIT 1",
                params![vendor_email],
                RfpRow::from_row,
            )
            .optional()?;
        row.map(|r| hydrate(conn, r)).transpose()
    })
}

/// Lists every RFP, newest first, with response and accepted counts.
pub fn list_with_counts(db: &Database) -> Result<Vec<RfpSummary>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(&format!(
            "SELECT {},
                (SELECT COUNT(*) FROM vendor_responses vr WHERE vr.rfp_id = rfps.id),
                (SELECT COUNT(*) FROM vendor_responses vr
                   WHERE vr.rfp_id = rfps.id AND vr.status = 'accepted')
             FROM rfps ORDER BY created_at DESC, rowid DESC",
            RFP_COLUMNS
        ))?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    RfpRow::from_row(row)?,
                    row.get::<_, u64>(13)?,
                    row.get::<_, u64>(14)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(row, response_count, accepted_count)| {
                Ok(RfpSummary {
                    rfp: hydrate(conn, row)?,
                    response_count,
                    accepted_count,
                })
            })
            .collect()
    })
}

/// Applies a status transition to an RFP under the connection lock.
pub fn transition<F>(db: &Database, id: &str, step: F) -> Result<Transition<Rfp>, DatabaseError>
where
    F: FnOnce(RfpStatus) -> Result<RfpStatus, TransitionError>,
{
    db.with_conn(|conn| {
        let tx = conn.transaction()?;
        let Some(mut rfp) = find_in(&tx, id)? else {
            return Ok(Transition::NotFound);
        };
        match step(rfp.status) {
            Ok(next) => {
                set_status_in(&tx, id, next)?;
                tx.commit()?;
                rfp.status = next;
                Ok(Transition::Applied(rfp))
            }
            Err(refusal) => Ok(Transition::Refused(refusal)),
        }
    })
}
