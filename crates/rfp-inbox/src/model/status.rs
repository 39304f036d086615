//! Status state machines for RFPs and vendor responses.
//!
//! ```text
//! RFP:      pending --close--> closed
//!           pending --accept--> accepted        (accepted is terminal)
//! Proposal: pending --analysis--> analyzed
//!           pending|analyzed --accept--> accepted   (terminal)
//!           pending|analyzed --reject--> rejected
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A requested status change that the state machine does not allow.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Cannot {action} {entity} in status '{from}'")]
pub struct TransitionError {
    pub entity: &'static str,
    pub action: &'static str,
    pub from: String,
}

/// An unrecognised status string read from storage or user input.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unknown status '{0}'")]
pub struct UnknownStatus(pub String);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RfpStatus {
    Pending,
    Closed,
    Accepted,
}

impl RfpStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RfpStatus::Pending => "pending",
            RfpStatus::Closed => "closed",
            RfpStatus::Accepted => "accepted",
        }
    }

    /// Administrative close of an open RFP.
    pub fn close(self) -> Result<Self, TransitionError> {
        match self {
            RfpStatus::Pending => Ok(RfpStatus::Closed),
            other => Err(other.refuse("close")),
        }
    }

    /// Transition caused by accepting one of the RFP's proposals.
    pub fn accept(self) -> Result<Self, TransitionError> {
        match self {
            RfpStatus::Pending => Ok(RfpStatus::Accepted),
            other => Err(other.refuse("accept a proposal for")),
        }
    }

    fn refuse(self, action: &'static str) -> TransitionError {
        TransitionError {
            entity: "RFP",
            action,
            from: self.as_str().to_string(),
        }
    }
}

impl fmt::Display for RfpStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RfpStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(RfpStatus::Pending),
            "closed" => Ok(RfpStatus::Closed),
            "accepted" => Ok(RfpStatus::Accepted),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProposalStatus {
    Pending,
    Analyzed,
    Accepted,
    Rejected,
}

impl ProposalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProposalStatus::Pending => "pending",
            ProposalStatus::Analyzed => "analyzed",
            ProposalStatus::Accepted => "accepted",
            ProposalStatus::Rejected => "rejected",
        }
    }

    /// Status after an analysis has been written onto the record.
    ///
    /// Only a pending proposal moves; a decided proposal keeps its decision
    /// even when it is re-analyzed.
    pub fn after_analysis(self) -> Self {
        match self {
            ProposalStatus::Pending => ProposalStatus::Analyzed,
            other => other,
        }
    }

    pub fn accept(self) -> Result<Self, TransitionError> {
        match self {
            ProposalStatus::Pending | ProposalStatus::Analyzed => Ok(ProposalStatus::Accepted),
            other => Err(other.refuse("accept")),
        }
    }

    pub fn reject(self) -> Result<Self, TransitionError> {
        match self {
            ProposalStatus::Pending | ProposalStatus::Analyzed => Ok(ProposalStatus::Rejected),
            other => Err(other.refuse("reject")),
        }
    }

    fn refuse(self, action: &'static str) -> TransitionError {
        TransitionError {
            entity: "proposal",
            action,
            from: self.as_str().to_string(),
        }
    }
}

impl fmt::Display for ProposalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProposalStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ProposalStatus::Pending),
            "analyzed" => Ok(ProposalStatus::Analyzed),
            "accepted" => Ok(ProposalStatus::Accepted),
            "rejected" => Ok(ProposalStatus::Rejected),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}
