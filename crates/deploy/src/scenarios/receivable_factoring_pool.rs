use crate::{Arg, ChainClient, DeployConfig, DeployError, DeployMode, Role, Session};

use super::{proxy_admin, request};

/// Minimum delay of the protocol config timelock, in seconds.
const TIMELOCK_MIN_DELAY_SECS: u64 = 0;

pub(super) async fn deploy_contracts<C: ChainClient>(
    session: &mut Session<'_, C>,
    config: &DeployConfig,
    mode: DeployMode,
) -> Result<(), DeployError> {
    let admin = proxy_admin(session, config);
    let deployer = session.roles().deployer;

    session
        .deploy(request(config, mode, "USDC", "TestToken"))
        .await?;

    session
        .deploy(request(config, mode, "HumaConfig", "HumaConfig").args([Arg::address(deployer)]))
        .await?;
    session
        .deploy(
            request(config, mode, "HumaConfigTimelock", "TimelockController").args([
                Arg::from(TIMELOCK_MIN_DELAY_SECS),
                Arg::Addresses(vec![deployer]),
                Arg::Addresses(vec![deployer]),
            ]),
        )
        .await?;

    session
        .deploy(request(
            config,
            mode,
            "ReceivableFactoringPoolFeeManager",
            "BaseFeeManager",
        ))
        .await?;
    session
        .deploy_proxy(request(config, mode, "HDT", "HDT"), admin)
        .await?;

    session
        .deploy(
            request(config, mode, "ReceivableFactoringPoolConfig", "BasePoolConfig").args([
                Arg::string("ReceivableFactoringPool"),
                Arg::contract("HDT"),
                Arg::contract("HumaConfig"),
                Arg::contract("ReceivableFactoringPoolFeeManager"),
            ]),
        )
        .await?;
    session
        .deploy_proxy(
            request(
                config,
                mode,
                "ReceivableFactoringPool",
                "ReceivableFactoringPool",
            ),
            admin,
        )
        .await?;

    session
        .deploy(request(config, mode, "EANFT", "EvaluationAgentNFT").signer(Role::EaService))
        .await?;
    session
        .deploy(request(config, mode, "RNNFT", "InvoiceNFT").args([Arg::contract("USDC")]))
        .await?;

    Ok(())
}
