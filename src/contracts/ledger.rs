// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Report Ledger
//!
//! Write-once confidential reports with sequential ids starting at 0.
//! Each report is owned by its submitter; the owner (and only the owner)
//! grows the set of viewers allowed to read the payload. Grants are
//! permanent.
//!
//! A single registered gasless proxy may submit on behalf of other users,
//! in which case the report is owned by the user the proxy names.

use alloy::primitives::{Address, U256};
use alloy::sol_types::{SolInterface, SolValue};
use serde::{Deserialize, Serialize};

use super::abi::IConfidentialReporter::IConfidentialReporterCalls;
use super::{u64_arg, ContractError, ContractKind, LedgerEvent};
use crate::blockchain::{CallContext, Chain, ChainError, Executed, MessageSigner};

const OWNER_SLOT: &str = "owner";
const PROXY_SLOT: &str = "gasless_proxy";
const COUNT_SLOT: &str = "report_count";

const NOT_AUTHORIZED_READ: &str = "Not authorized for this report.";
const ONLY_OWNER_GRANTS: &str = "Only owner can grant access.";
const ONLY_ADMIN: &str = "Only the contract owner can call this.";
const ONLY_PROXY: &str = "Only the gasless proxy can submit on behalf of users.";

/// A stored report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Report {
    pub id: u64,
    pub owner: Address,
    /// Opaque, typically encrypted, transcript.
    pub payload: String,
    /// Viewers in grant order, without duplicates.
    pub authorized_viewers: Vec<Address>,
    pub submitted_at_block: u64,
}

impl Report {
    pub fn can_read(&self, account: Address) -> bool {
        account == self.owner || self.authorized_viewers.contains(&account)
    }
}

/// Handle to a deployed ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportLedger {
    address: Address,
}

impl ReportLedger {
    pub fn at(address: Address) -> Self {
        Self { address }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    // =========================================================================
    // Contract code
    // =========================================================================

    /// Constructor: the deployer becomes the ledger administrator.
    pub fn construct(ctx: &mut CallContext<'_>, address: Address) -> Result<Self, ChainError> {
        ctx.state().set_address_slot(address, OWNER_SLOT, ctx.sender())?;
        ctx.state().set_u64_slot(address, COUNT_SLOT, 0)?;
        Ok(Self::at(address))
    }

    /// Store a report owned by the caller and return its id.
    pub fn submit_report(&self, ctx: &mut CallContext<'_>, payload: &str) -> Result<u64, ChainError> {
        ctx.expect_code(self.address, ContractKind::ReportLedger)?;
        let owner = ctx.sender();
        self.record(ctx, owner, payload)
    }

    /// Relay entry: store a report owned by `user`. Only the registered
    /// gasless proxy may call this.
    pub fn submit_report_for(
        &self,
        ctx: &mut CallContext<'_>,
        user: Address,
        payload: &str,
    ) -> Result<u64, ChainError> {
        ctx.expect_code(self.address, ContractKind::ReportLedger)?;
        let proxy = ctx
            .state()
            .address_slot(self.address, PROXY_SLOT)?
            .ok_or_else(|| ContractError::configuration("Gasless proxy not configured."))?;
        if ctx.sender() != proxy {
            return Err(ContractError::unauthorized(ONLY_PROXY).into());
        }
        self.record(ctx, user, payload)
    }

    fn record(
        &self,
        ctx: &mut CallContext<'_>,
        owner: Address,
        payload: &str,
    ) -> Result<u64, ChainError> {
        let state = ctx.state();
        let report_id = state.u64_slot(self.address, COUNT_SLOT)?;
        let report = Report {
            id: report_id,
            owner,
            payload: payload.to_string(),
            authorized_viewers: Vec::new(),
            submitted_at_block: ctx.block_number(),
        };
        state.put_report(self.address, report_id, &report)?;
        state.set_u64_slot(self.address, COUNT_SLOT, report_id + 1)?;

        ctx.emit(self.address, LedgerEvent::ReportSubmitted { report_id, owner });
        Ok(report_id)
    }

    fn load(&self, ctx: &CallContext<'_>, report_id: u64) -> Result<Report, ChainError> {
        ctx.state()
            .report::<Report>(self.address, report_id)?
            .ok_or_else(|| ContractError::NotFound { report_id }.into())
    }

    /// Payload of `report_id`, readable by its owner and granted viewers.
    pub fn get_report_payload(
        &self,
        ctx: &mut CallContext<'_>,
        report_id: u64,
    ) -> Result<String, ChainError> {
        ctx.expect_code(self.address, ContractKind::ReportLedger)?;
        let report = self.load(ctx, report_id)?;
        if !report.can_read(ctx.sender()) {
            return Err(ContractError::unauthorized(NOT_AUTHORIZED_READ).into());
        }
        Ok(report.payload)
    }

    /// Let `viewer` read `report_id`. Owner only.
    pub fn grant_access(
        &self,
        ctx: &mut CallContext<'_>,
        report_id: u64,
        viewer: Address,
    ) -> Result<(), ChainError> {
        ctx.expect_code(self.address, ContractKind::ReportLedger)?;
        let mut report = self.load(ctx, report_id)?;
        if ctx.sender() != report.owner {
            return Err(ContractError::unauthorized(ONLY_OWNER_GRANTS).into());
        }

        if !report.authorized_viewers.contains(&viewer) {
            report.authorized_viewers.push(viewer);
            ctx.state().put_report(self.address, report_id, &report)?;
        }

        ctx.emit(
            self.address,
            LedgerEvent::AccessGranted {
                report_id,
                owner: report.owner,
                viewer,
            },
        );
        Ok(())
    }

    /// Register the single proxy allowed to submit on behalf of users.
    pub fn set_gasless_proxy(
        &self,
        ctx: &mut CallContext<'_>,
        proxy: Address,
    ) -> Result<(), ChainError> {
        self.only_admin(ctx)?;
        if proxy == Address::ZERO {
            return Err(ContractError::configuration("Gasless proxy cannot be the zero address.").into());
        }
        ctx.state().set_address_slot(self.address, PROXY_SLOT, proxy)?;
        tracing::info!(ledger = %self.address, %proxy, "gasless proxy registered");
        Ok(())
    }

    pub fn total_report_count(&self, ctx: &mut CallContext<'_>) -> Result<u64, ChainError> {
        ctx.expect_code(self.address, ContractKind::ReportLedger)?;
        Ok(ctx.state().u64_slot(self.address, COUNT_SLOT)?)
    }

    /// Registered proxy, `None` until one is set.
    pub fn gasless_proxy(&self, ctx: &mut CallContext<'_>) -> Result<Option<Address>, ChainError> {
        ctx.expect_code(self.address, ContractKind::ReportLedger)?;
        Ok(ctx.state().address_slot(self.address, PROXY_SLOT)?)
    }

    /// Ledger administrator.
    pub fn owner(&self, ctx: &mut CallContext<'_>) -> Result<Address, ChainError> {
        ctx.expect_code(self.address, ContractKind::ReportLedger)?;
        Ok(ctx
            .state()
            .address_slot(self.address, OWNER_SLOT)?
            .unwrap_or(Address::ZERO))
    }

    /// Owner of `report_id`. Public, like the `ReportSubmitted` event.
    pub fn report_owner(
        &self,
        ctx: &mut CallContext<'_>,
        report_id: u64,
    ) -> Result<Address, ChainError> {
        ctx.expect_code(self.address, ContractKind::ReportLedger)?;
        Ok(self.load(ctx, report_id)?.owner)
    }

    pub fn is_authorized(
        &self,
        ctx: &mut CallContext<'_>,
        report_id: u64,
        account: Address,
    ) -> Result<bool, ChainError> {
        ctx.expect_code(self.address, ContractKind::ReportLedger)?;
        Ok(self.load(ctx, report_id)?.can_read(account))
    }

    fn only_admin(&self, ctx: &mut CallContext<'_>) -> Result<(), ChainError> {
        if ctx.sender() != self.owner(ctx)? {
            return Err(ContractError::unauthorized(ONLY_ADMIN).into());
        }
        Ok(())
    }

    /// Execute ABI calldata against this ledger.
    pub(crate) fn dispatch(
        &self,
        ctx: &mut CallContext<'_>,
        calldata: &[u8],
    ) -> Result<Vec<u8>, ChainError> {
        let call = IConfidentialReporterCalls::abi_decode(calldata)
            .map_err(|e| ChainError::Abi(e.to_string()))?;

        let output = match call {
            IConfidentialReporterCalls::submitReport(c) => {
                U256::from(self.submit_report(ctx, &c.payload)?).abi_encode()
            }
            IConfidentialReporterCalls::submitReportFor(c) => {
                U256::from(self.submit_report_for(ctx, c.user, &c.payload)?).abi_encode()
            }
            IConfidentialReporterCalls::getReportPayload(c) => {
                let id = u64_arg(c.reportId, "reportId")?;
                (self.get_report_payload(ctx, id)?,).abi_encode_params()
            }
            IConfidentialReporterCalls::grantAccess(c) => {
                let id = u64_arg(c.reportId, "reportId")?;
                self.grant_access(ctx, id, c.viewer)?;
                Vec::new()
            }
            IConfidentialReporterCalls::setGaslessProxy(c) => {
                self.set_gasless_proxy(ctx, c.proxy)?;
                Vec::new()
            }
            IConfidentialReporterCalls::totalReportCount(_) => {
                U256::from(self.total_report_count(ctx)?).abi_encode()
            }
            IConfidentialReporterCalls::gaslessProxy(_) => self
                .gasless_proxy(ctx)?
                .unwrap_or(Address::ZERO)
                .abi_encode(),
            IConfidentialReporterCalls::owner(_) => self.owner(ctx)?.abi_encode(),
            IConfidentialReporterCalls::reportOwner(c) => {
                let id = u64_arg(c.reportId, "reportId")?;
                self.report_owner(ctx, id)?.abi_encode()
            }
            IConfidentialReporterCalls::isAuthorized(c) => {
                let id = u64_arg(c.reportId, "reportId")?;
                self.is_authorized(ctx, id, c.account)?.abi_encode()
            }
        };
        Ok(output)
    }

    // =========================================================================
    // Transactions and queries
    // =========================================================================

    /// Deploy a new ledger administered by `deployer`.
    pub fn deploy(chain: &Chain, deployer: &dyn MessageSigner) -> Result<Executed<Self>, ChainError> {
        chain.deploy(deployer, ContractKind::ReportLedger, Self::construct)
    }

    pub fn submit_report_tx(
        &self,
        chain: &Chain,
        sender: &dyn MessageSigner,
        payload: &str,
    ) -> Result<Executed<u64>, ChainError> {
        chain.transact(sender, self.address, "submitReport", |ctx| {
            self.submit_report(ctx, payload)
        })
    }

    pub fn grant_access_tx(
        &self,
        chain: &Chain,
        sender: &dyn MessageSigner,
        report_id: u64,
        viewer: Address,
    ) -> Result<Executed<()>, ChainError> {
        chain.transact(sender, self.address, "grantAccess", |ctx| {
            self.grant_access(ctx, report_id, viewer)
        })
    }

    pub fn set_gasless_proxy_tx(
        &self,
        chain: &Chain,
        sender: &dyn MessageSigner,
        proxy: Address,
    ) -> Result<Executed<()>, ChainError> {
        chain.transact(sender, self.address, "setGaslessProxy", |ctx| {
            self.set_gasless_proxy(ctx, proxy)
        })
    }

    /// Signed read of a payload as `caller`.
    pub fn report_payload_call(
        &self,
        chain: &Chain,
        caller: &dyn MessageSigner,
        report_id: u64,
    ) -> Result<String, ChainError> {
        chain.call(caller, self.address, "getReportPayload", |ctx| {
            self.get_report_payload(ctx, report_id)
        })
    }

    pub fn total_report_count_view(&self, chain: &Chain) -> Result<u64, ChainError> {
        chain.view(self.address, "totalReportCount", |ctx| self.total_report_count(ctx))
    }

    pub fn gasless_proxy_view(&self, chain: &Chain) -> Result<Option<Address>, ChainError> {
        chain.view(self.address, "gaslessProxy", |ctx| self.gasless_proxy(ctx))
    }

    pub fn owner_view(&self, chain: &Chain) -> Result<Address, ChainError> {
        chain.view(self.address, "owner", |ctx| self.owner(ctx))
    }

    pub fn report_owner_view(&self, chain: &Chain, report_id: u64) -> Result<Address, ChainError> {
        chain.view(self.address, "reportOwner", |ctx| self.report_owner(ctx, report_id))
    }

    pub fn is_authorized_view(
        &self,
        chain: &Chain,
        report_id: u64,
        account: Address,
    ) -> Result<bool, ChainError> {
        chain.view(self.address, "isAuthorized", |ctx| {
            self.is_authorized(ctx, report_id, account)
        })
    }
}
