//! Follow-up actions on an already deployed base credit pool.

use crate::{Arg, ChainClient, DeployError, Session, SetupStep};

pub(super) async fn approve_lenders<C: ChainClient>(
    session: &mut Session<'_, C>,
) -> Result<(), DeployError> {
    let roles = session.roles().clone();

    session
        .ensure_phase(
            "BaseCreditPool",
            "lenders",
            &[
                SetupStep::new("addApprovedLender", [Arg::address(roles.evaluation_agent)]),
                SetupStep::new("addApprovedLender", [Arg::address(roles.treasury)]),
            ],
        )
        .await?;

    Ok(())
}

pub(super) async fn enable_pool<C: ChainClient>(
    session: &mut Session<'_, C>,
) -> Result<(), DeployError> {
    session
        .ensure_phase(
            "BaseCreditPool",
            "enabled",
            &[SetupStep::new("enablePool", [])],
        )
        .await?;

    Ok(())
}
