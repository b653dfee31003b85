use alloy_core::primitives::Address;

use crate::{
    Arg, ChainClient, DeployConfig, DeployError, DeployMode, Guard, Role, Session, SetupStep,
};

use super::{proxy_admin, request, usdc};

/// Protocol fee taken by the treasury, in bps.
const TREASURY_FEE_BPS: u64 = 500;
const PROTOCOL_DEFAULT_GRACE_PERIOD_SECS: u64 = 30 * 24 * 3600;

const POOL_LIQUIDITY_CAP_USDC: u64 = 1_000_000;
const MAX_CREDIT_LINE_USDC: u64 = 10_000;
const TREASURY_DEPOSIT_USDC: u64 = 20_000;
const EA_DEPOSIT_USDC: u64 = 10_000;

pub(super) async fn deploy_contracts<C: ChainClient>(
    session: &mut Session<'_, C>,
    config: &DeployConfig,
    mode: DeployMode,
    with_invoice_nft: bool,
) -> Result<(), DeployError> {
    let admin = proxy_admin(session, config);

    session
        .deploy(request(config, mode, "USDC", "TestToken"))
        .await?;
    session
        .deploy(request(config, mode, "EANFT", "EvaluationAgentNFT").signer(Role::EaService))
        .await?;
    if with_invoice_nft {
        session
            .deploy(request(config, mode, "RNNFT", "InvoiceNFT").args([Arg::contract("USDC")]))
            .await?;
    }

    session
        .deploy(request(config, mode, "HumaConfig", "HumaConfig"))
        .await?;
    session
        .deploy(request(config, mode, "BaseCreditPoolFeeManager", "BaseFeeManager"))
        .await?;
    session
        .deploy_proxy(request(config, mode, "BaseCreditHDT", "HDT"), admin)
        .await?;
    session
        .deploy(request(config, mode, "BaseCreditPoolConfig", "BasePoolConfig"))
        .await?;
    session
        .deploy_proxy(request(config, mode, "BaseCreditPool", "BaseCreditPool"), admin)
        .await?;

    Ok(())
}

pub(super) async fn initialize<C: ChainClient>(
    session: &mut Session<'_, C>,
) -> Result<(), DeployError> {
    let roles = session.roles().clone();

    session
        .ensure_initialized(
            "HumaConfig",
            &[
                SetupStep::new("setHumaTreasury", [Arg::address(roles.treasury)]),
                SetupStep::new("setTreasuryFee", [Arg::from(TREASURY_FEE_BPS)]),
                SetupStep::new("setEANFTContractAddress", [Arg::contract("EANFT")]),
                SetupStep::new("setEAServiceAccount", [Arg::address(roles.ea_service)]),
                SetupStep::new("setPDSServiceAccount", [Arg::address(roles.pds_service)]),
                SetupStep::new(
                    "setProtocolDefaultGracePeriod",
                    [Arg::from(PROTOCOL_DEFAULT_GRACE_PERIOD_SECS)],
                ),
                SetupStep::new(
                    "setLiquidityAsset",
                    [Arg::contract("USDC"), Arg::from(true)],
                ),
            ],
        )
        .await?;

    session
        .ensure_initialized(
            "EANFT",
            &[
                SetupStep::new("mintNFT", [Arg::address(roles.evaluation_agent)])
                    .from(Role::EvaluationAgent)
                    .skip_if_nonzero(Guard::view(
                        "EANFT",
                        "balanceOf",
                        [Arg::address(roles.evaluation_agent)],
                    )),
            ],
        )
        .await?;

    session
        .ensure_initialized(
            "BaseCreditPoolFeeManager",
            &[SetupStep::new("setFees", [0u64, 0, 0, 0, 0].map(Arg::from))],
        )
        .await?;

    session
        .ensure_initialized(
            "BaseCreditHDT",
            &[SetupStep::new(
                "initialize",
                [
                    Arg::string("Credit HDT"),
                    Arg::string("CHDT"),
                    Arg::contract("USDC"),
                ],
            )],
        )
        .await?;
    session
        .ensure_phase(
            "BaseCreditHDT",
            "pool",
            &[SetupStep::new("setPool", [Arg::contract("BaseCreditPool")])],
        )
        .await?;

    session
        .ensure_initialized(
            "BaseCreditPoolConfig",
            &[SetupStep::new(
                "initialize",
                [
                    Arg::string("CreditLinePool"),
                    Arg::contract("BaseCreditHDT"),
                    Arg::contract("HumaConfig"),
                    Arg::contract("BaseCreditPoolFeeManager"),
                ],
            )],
        )
        .await?;
    session
        .ensure_phase(
            "BaseCreditPoolConfig",
            "params",
            &[
                SetupStep::new(
                    "setPoolLiquidityCap",
                    [Arg::uint(usdc(POOL_LIQUIDITY_CAP_USDC))],
                ),
                SetupStep::new("setPool", [Arg::contract("BaseCreditPool")]),
                SetupStep::new("setPoolOwnerRewardsAndLiquidity", [500u64, 200].map(Arg::from)),
                SetupStep::new("setEARewardsAndLiquidity", [1000u64, 100].map(Arg::from)),
                SetupStep::new(
                    "setEvaluationAgent",
                    [Arg::from(1u64), Arg::address(roles.evaluation_agent)],
                ),
                SetupStep::new("setMaxCreditLine", [Arg::uint(usdc(MAX_CREDIT_LINE_USDC))]),
                SetupStep::new("setAPR", [Arg::from(0u64)]),
                SetupStep::new("setReceivableRequiredInBps", [Arg::from(0u64)]),
                SetupStep::new("setPoolPayPeriod", [Arg::from(15u64)]),
                SetupStep::new("setPoolToken", [Arg::contract("BaseCreditHDT")]),
                SetupStep::new("setWithdrawalLockoutPeriod", [Arg::from(0u64)]),
                SetupStep::new("setPoolDefaultGracePeriod", [Arg::from(60u64)]),
                SetupStep::new("setPoolOwnerTreasury", [Arg::address(roles.treasury)]),
                SetupStep::new("setCreditApprovalExpiration", [Arg::from(5u64)]),
                SetupStep::new("addPoolOperator", [Arg::address(roles.deployer)]),
            ],
        )
        .await?;

    session
        .ensure_initialized(
            "BaseCreditPool",
            &[SetupStep::new(
                "initialize",
                [Arg::contract("BaseCreditPoolConfig")],
            )],
        )
        .await?;

    let mut liquidity = vec![
        SetupStep::new("addApprovedLender", [Arg::address(roles.evaluation_agent)]),
        SetupStep::new("addApprovedLender", [Arg::address(roles.treasury)]),
    ];
    liquidity.extend(initial_deposit(
        Role::Treasury,
        roles.treasury,
        TREASURY_DEPOSIT_USDC,
    ));
    liquidity.extend(initial_deposit(
        Role::EvaluationAgent,
        roles.evaluation_agent,
        EA_DEPOSIT_USDC,
    ));
    liquidity.push(SetupStep::new("enablePool", []));

    session
        .ensure_phase("BaseCreditPool", "liquidity", &liquidity)
        .await?;

    Ok(())
}

/// Mint test USDC to `depositor`, approve the pool and make the initial
/// deposit. Skipped once the depositor holds pool tokens; the mint is also
/// skipped while the depositor still holds USDC from an earlier attempt.
fn initial_deposit(
    depositor: Role,
    depositor_address: Address,
    amount_usdc: u64,
) -> [SetupStep; 3] {
    let amount = Arg::uint(usdc(amount_usdc));
    let deposited = Guard::view(
        "BaseCreditHDT",
        "balanceOf",
        [Arg::address(depositor_address)],
    );
    let funded = Guard::view("USDC", "balanceOf", [Arg::address(depositor_address)]);

    [
        SetupStep::new("mint", [Arg::address(depositor_address), amount.clone()])
            .on("USDC")
            .skip_if_nonzero(deposited.clone())
            .skip_if_nonzero(funded),
        SetupStep::new("approve", [Arg::contract("BaseCreditPool"), amount.clone()])
            .on("USDC")
            .from(depositor)
            .skip_if_nonzero(deposited.clone()),
        SetupStep::new("makeInitialDeposit", [amount])
            .from(depositor)
            .skip_if_nonzero(deposited),
    ]
}
