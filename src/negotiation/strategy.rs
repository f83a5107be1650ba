use crate::common::{config::TieBreak, types::StockTable};
use crate::event::UniformSource;
use crate::protocol::{ProposalContent, TradeTerms};
use crate::trader::UtilityModel;

/// Offers the most sellable commodity in stock against the one this trader
/// would most like to hold. Falls back to `NoTrade` whenever either side of the
/// swap would be empty.
pub fn draft_proposal(model: &UtilityModel, stock: &StockTable) -> ProposalContent {
    let Some(offered) = model.best_to_sell(stock) else {
        return ProposalContent::NoTrade;
    };
    let Some(requested) = model.best_to_hold(offered) else {
        return ProposalContent::NoTrade;
    };
    let Some(ratio) = model.trade_ratio(offered, requested) else {
        return ProposalContent::NoTrade;
    };

    let offered_qty = model.quantity_to_sell(offered, stock[offered]);
    let requested_qty = (offered_qty as f64 * ratio).round() as u32;
    if offered_qty == 0 || requested_qty == 0 {
        return ProposalContent::NoTrade;
    }

    ProposalContent::Offer(TradeTerms {
        offered,
        offered_qty,
        requested,
        requested_qty,
    })
}

/// Whether a peer's terms are worth taking. The acceptor receives `offered`
/// and gives up `requested`; bold traders inflate the gain by their risk.
pub fn is_acceptable(model: &UtilityModel, terms: &TradeTerms) -> bool {
    let gain = model.utility_hold(terms.offered) * terms.offered_qty as f64;
    let loss = model.utility_sell(terms.requested) * terms.requested_qty as f64;
    if model.risk < 0.5 {
        gain > loss
    } else {
        gain * (1.0 + model.risk) > loss
    }
}

/// Index of the accept to commit to, out of `accepts` in arrival order.
pub fn pick_counterparty(
    accepts: usize,
    tie_break: TieBreak,
    source: &mut dyn UniformSource,
) -> Option<usize> {
    match (accepts, tie_break) {
        (0, _) => None,
        (1, _) | (_, TieBreak::FirstArrival) => Some(0),
        (_, TieBreak::Random) => Some(source.index(accepts).min(accepts - 1)),
    }
}
