//! Vivi ledger contract
//!
//! Authoritative registry of posts, comments, reactions and bounty escrow.
//! Each public operation is one transaction: it checks every precondition
//! first and only then mutates state, so a revert leaves nothing behind.
//!
//! Money moves only through this type. Balances of external accounts are
//! simulated here as well so escrow, refunds and awards can be checked
//! exactly.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use super::events::LedgerEvent;
use super::types::{Address, CommentId, CommentRecord, ContentType, PostId, PostRecord, Wei};

/// Transaction revert with its reason string
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{reason}")]
pub struct Revert {
    reason: String,
}

impl Revert {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }
}

fn require(condition: bool, reason: &str) -> Result<(), Revert> {
    if condition {
        Ok(())
    } else {
        Err(Revert::new(reason))
    }
}

/// Sender and attached value of a transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallContext {
    pub sender: Address,
    pub value: Wei,
}

impl CallContext {
    pub fn new(sender: Address) -> Self {
        Self {
            sender,
            value: Wei::ZERO,
        }
    }

    pub fn with_value(mut self, value: Wei) -> Self {
        self.value = value;
        self
    }
}

/// Result of a successful call: emitted events and an optional issued id
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallOutcome {
    pub events: Vec<LedgerEvent>,
    pub issued_id: Option<u64>,
}

impl CallOutcome {
    fn event(event: LedgerEvent) -> Self {
        Self {
            events: vec![event],
            issued_id: None,
        }
    }

    fn issued(id: u64, event: LedgerEvent) -> Self {
        Self {
            events: vec![event],
            issued_id: Some(id),
        }
    }
}

type ReactionSets<K> = HashMap<K, BTreeSet<Address>>;

/// Contract state
#[derive(Debug, Clone)]
pub struct ViviContract {
    owner: Address,
    post_count: u64,
    comment_count: u64,
    posts: BTreeMap<PostId, PostRecord>,
    comments: BTreeMap<CommentId, CommentRecord>,
    post_comments: HashMap<PostId, Vec<CommentId>>,
    post_likers: ReactionSets<PostId>,
    post_dislikers: ReactionSets<PostId>,
    comment_likers: ReactionSets<CommentId>,
    comment_dislikers: ReactionSets<CommentId>,
    balances: HashMap<Address, Wei>,
    contract_balance: Wei,
}

impl ViviContract {
    /// Deploy a fresh contract owned by `owner`
    pub fn new(owner: Address) -> Self {
        Self {
            owner,
            post_count: 0,
            comment_count: 0,
            posts: BTreeMap::new(),
            comments: BTreeMap::new(),
            post_comments: HashMap::new(),
            post_likers: HashMap::new(),
            post_dislikers: HashMap::new(),
            comment_likers: HashMap::new(),
            comment_dislikers: HashMap::new(),
            balances: HashMap::new(),
            contract_balance: Wei::ZERO,
        }
    }

    // =========================================================================
    // Posts and bounties
    // =========================================================================

    pub fn create_post(
        &mut self,
        ctx: &CallContext,
        content_hash: &str,
        post_type: ContentType,
    ) -> Result<CallOutcome, Revert> {
        require(!content_hash.is_empty(), "Content hash cannot be empty")?;
        self.require_funds(ctx)?;

        self.escrow_value(ctx);
        self.post_count += 1;
        let id = self.post_count;
        self.posts.insert(
            id,
            PostRecord {
                id,
                creator: ctx.sender.clone(),
                content_hash: content_hash.to_string(),
                post_type,
                bounty_amount: ctx.value,
                is_active: true,
            },
        );

        Ok(CallOutcome::issued(
            id,
            LedgerEvent::PostCreated {
                post_id: id,
                creator: ctx.sender.clone(),
                content_hash: content_hash.to_string(),
                post_type,
                bounty_amount: ctx.value,
            },
        ))
    }

    pub fn add_bounty_to_post(
        &mut self,
        ctx: &CallContext,
        post_id: PostId,
    ) -> Result<CallOutcome, Revert> {
        let post = self.active_post(post_id)?;
        require(!ctx.value.is_zero(), "Bounty amount must be greater than 0")?;
        let new_amount = post
            .bounty_amount
            .checked_add(ctx.value)
            .ok_or_else(|| Revert::new("Bounty overflow"))?;
        self.require_funds(ctx)?;

        self.escrow_value(ctx);
        if let Some(post) = self.posts.get_mut(&post_id) {
            post.bounty_amount = new_amount;
        }

        Ok(CallOutcome::event(LedgerEvent::BountyAdded {
            post_id,
            sender: ctx.sender.clone(),
            bounty_amount: ctx.value,
        }))
    }

    pub fn award_bounty(
        &mut self,
        ctx: &CallContext,
        post_id: PostId,
        winner: &Address,
    ) -> Result<CallOutcome, Revert> {
        require_no_value(ctx)?;
        let post = self.existing_post(post_id)?;
        require(
            post.creator == ctx.sender,
            "Only post creator can award bounty",
        )?;
        require(post.is_active, "Post is not active")?;
        require(!post.bounty_amount.is_zero(), "No bounty to award")?;
        require(!winner.is_zero(), "Invalid winner address")?;
        let amount = post.bounty_amount;
        require(self.contract_balance >= amount, "Transfer failed")?;

        if let Some(post) = self.posts.get_mut(&post_id) {
            post.bounty_amount = Wei::ZERO;
        }
        self.pay_out(winner, amount);

        Ok(CallOutcome::event(LedgerEvent::BountyAwarded {
            post_id,
            winner: winner.clone(),
        }))
    }

    pub fn cancel_post(&mut self, ctx: &CallContext, post_id: PostId) -> Result<CallOutcome, Revert> {
        require_no_value(ctx)?;
        let post = self.existing_post(post_id)?;
        require(
            post.creator == ctx.sender,
            "Only post creator can cancel post",
        )?;
        require(post.is_active, "Post is not active")?;
        let refund = post.bounty_amount;
        let creator = post.creator.clone();
        require(self.contract_balance >= refund, "Transfer failed")?;

        if let Some(post) = self.posts.get_mut(&post_id) {
            post.bounty_amount = Wei::ZERO;
            post.is_active = false;
        }
        if !refund.is_zero() {
            self.pay_out(&creator, refund);
        }

        Ok(CallOutcome::event(LedgerEvent::PostCancelled { post_id, creator }))
    }

    // =========================================================================
    // Comments
    // =========================================================================

    pub fn add_comment(
        &mut self,
        ctx: &CallContext,
        post_id: PostId,
        content_hash: &str,
        comment_type: ContentType,
        is_anonymous: bool,
    ) -> Result<CallOutcome, Revert> {
        require_no_value(ctx)?;
        self.active_post(post_id)?;
        require(!content_hash.is_empty(), "Content hash cannot be empty")?;

        self.comment_count += 1;
        let id = self.comment_count;
        let commenter = if is_anonymous {
            Address::zero()
        } else {
            ctx.sender.clone()
        };
        self.comments.insert(
            id,
            CommentRecord {
                id,
                post_id,
                commenter: commenter.clone(),
                content_hash: content_hash.to_string(),
                comment_type,
                is_anonymous,
                is_active: true,
            },
        );
        self.post_comments.entry(post_id).or_default().push(id);

        Ok(CallOutcome::issued(
            id,
            LedgerEvent::CommentAdded {
                post_id,
                comment_id: id,
                commenter,
                is_anonymous,
                content_hash: content_hash.to_string(),
                comment_type,
            },
        ))
    }

    pub fn edit_comment(
        &mut self,
        ctx: &CallContext,
        comment_id: CommentId,
        new_content_hash: &str,
    ) -> Result<CallOutcome, Revert> {
        require_no_value(ctx)?;
        let comment = self.active_comment(comment_id)?;
        require(
            comment.commenter == ctx.sender,
            "Only commenter can edit comment",
        )?;
        require(!new_content_hash.is_empty(), "Content hash cannot be empty")?;

        if let Some(comment) = self.comments.get_mut(&comment_id) {
            comment.content_hash = new_content_hash.to_string();
        }

        Ok(CallOutcome::event(LedgerEvent::CommentEdited {
            comment_id,
            new_content_hash: new_content_hash.to_string(),
        }))
    }

    pub fn delete_comment(
        &mut self,
        ctx: &CallContext,
        comment_id: CommentId,
    ) -> Result<CallOutcome, Revert> {
        require_no_value(ctx)?;
        let comment = self.active_comment(comment_id)?;
        require(
            comment.commenter == ctx.sender,
            "Only commenter can delete comment",
        )?;

        if let Some(comment) = self.comments.get_mut(&comment_id) {
            comment.is_active = false;
        }

        Ok(CallOutcome::event(LedgerEvent::CommentDeleted { comment_id }))
    }

    // =========================================================================
    // Reactions
    // =========================================================================

    pub fn like_post(&mut self, ctx: &CallContext, post_id: PostId) -> Result<CallOutcome, Revert> {
        require_no_value(ctx)?;
        self.active_post(post_id)?;
        require(
            !has(&self.post_likers, post_id, &ctx.sender),
            "Already liked this post",
        )?;

        react(
            &mut self.post_likers,
            &mut self.post_dislikers,
            post_id,
            &ctx.sender,
        );
        Ok(CallOutcome::event(LedgerEvent::PostLiked {
            post_id,
            liker: ctx.sender.clone(),
        }))
    }

    pub fn dislike_post(&mut self, ctx: &CallContext, post_id: PostId) -> Result<CallOutcome, Revert> {
        require_no_value(ctx)?;
        self.active_post(post_id)?;
        require(
            !has(&self.post_dislikers, post_id, &ctx.sender),
            "Already disliked this post",
        )?;

        react(
            &mut self.post_dislikers,
            &mut self.post_likers,
            post_id,
            &ctx.sender,
        );
        Ok(CallOutcome::event(LedgerEvent::PostDisliked {
            post_id,
            disliker: ctx.sender.clone(),
        }))
    }

    pub fn like_comment(
        &mut self,
        ctx: &CallContext,
        comment_id: CommentId,
    ) -> Result<CallOutcome, Revert> {
        require_no_value(ctx)?;
        self.active_comment(comment_id)?;
        require(
            !has(&self.comment_likers, comment_id, &ctx.sender),
            "Already liked this comment",
        )?;

        react(
            &mut self.comment_likers,
            &mut self.comment_dislikers,
            comment_id,
            &ctx.sender,
        );
        Ok(CallOutcome::event(LedgerEvent::CommentLiked {
            comment_id,
            liker: ctx.sender.clone(),
        }))
    }

    pub fn dislike_comment(
        &mut self,
        ctx: &CallContext,
        comment_id: CommentId,
    ) -> Result<CallOutcome, Revert> {
        require_no_value(ctx)?;
        self.active_comment(comment_id)?;
        require(
            !has(&self.comment_dislikers, comment_id, &ctx.sender),
            "Already disliked this comment",
        )?;

        react(
            &mut self.comment_dislikers,
            &mut self.comment_likers,
            comment_id,
            &ctx.sender,
        );
        Ok(CallOutcome::event(LedgerEvent::CommentDisliked {
            comment_id,
            disliker: ctx.sender.clone(),
        }))
    }

    // =========================================================================
    // Ownership
    // =========================================================================

    pub fn recover_eth(&mut self, ctx: &CallContext) -> Result<CallOutcome, Revert> {
        require_no_value(ctx)?;
        self.only_owner(ctx)?;
        let amount = self.contract_balance;
        require(!amount.is_zero(), "No ETH to recover")?;

        let owner = self.owner.clone();
        self.pay_out(&owner, amount);
        Ok(CallOutcome::event(LedgerEvent::EmergencyEthRecovered { amount }))
    }

    pub fn transfer_ownership(
        &mut self,
        ctx: &CallContext,
        new_owner: &Address,
    ) -> Result<CallOutcome, Revert> {
        require_no_value(ctx)?;
        self.only_owner(ctx)?;
        require(
            !new_owner.is_zero(),
            "Ownable: new owner is the zero address",
        )?;
        Ok(CallOutcome::event(self.set_owner(new_owner.clone())))
    }

    pub fn renounce_ownership(&mut self, ctx: &CallContext) -> Result<CallOutcome, Revert> {
        require_no_value(ctx)?;
        self.only_owner(ctx)?;
        Ok(CallOutcome::event(self.set_owner(Address::zero())))
    }

    // =========================================================================
    // Development chain helpers
    // =========================================================================

    /// Mint balance to an account (development chain faucet)
    pub fn credit(&mut self, account: &Address, amount: Wei) -> Wei {
        let balance = self.balances.entry(account.clone()).or_default();
        *balance = balance.checked_add(amount).unwrap_or(Wei(u128::MAX));
        *balance
    }

    // =========================================================================
    // Views
    // =========================================================================

    pub fn owner(&self) -> &Address {
        &self.owner
    }

    pub fn post_count(&self) -> u64 {
        self.post_count
    }

    pub fn comment_count(&self) -> u64 {
        self.comment_count
    }

    pub fn post(&self, post_id: PostId) -> Option<&PostRecord> {
        self.posts.get(&post_id)
    }

    pub fn comment(&self, comment_id: CommentId) -> Option<&CommentRecord> {
        self.comments.get(&comment_id)
    }

    pub fn posts(&self) -> impl Iterator<Item = &PostRecord> {
        self.posts.values()
    }

    pub fn comments(&self) -> impl Iterator<Item = &CommentRecord> {
        self.comments.values()
    }

    pub fn post_comments(&self, post_id: PostId) -> &[CommentId] {
        self.post_comments
            .get(&post_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn post_likes(&self, post_id: PostId) -> u64 {
        count(&self.post_likers, post_id)
    }

    pub fn post_dislikes(&self, post_id: PostId) -> u64 {
        count(&self.post_dislikers, post_id)
    }

    pub fn comment_likes(&self, comment_id: CommentId) -> u64 {
        count(&self.comment_likers, comment_id)
    }

    pub fn comment_dislikes(&self, comment_id: CommentId) -> u64 {
        count(&self.comment_dislikers, comment_id)
    }

    pub fn has_liked_post(&self, account: &Address, post_id: PostId) -> bool {
        has(&self.post_likers, post_id, account)
    }

    pub fn has_disliked_post(&self, account: &Address, post_id: PostId) -> bool {
        has(&self.post_dislikers, post_id, account)
    }

    pub fn has_liked_comment(&self, account: &Address, comment_id: CommentId) -> bool {
        has(&self.comment_likers, comment_id, account)
    }

    pub fn has_disliked_comment(&self, account: &Address, comment_id: CommentId) -> bool {
        has(&self.comment_dislikers, comment_id, account)
    }

    /// Accounts currently liking / disliking a post
    pub fn post_reactions(&self, post_id: PostId) -> (Vec<Address>, Vec<Address>) {
        (
            members(&self.post_likers, post_id),
            members(&self.post_dislikers, post_id),
        )
    }

    /// Accounts currently liking / disliking a comment
    pub fn comment_reactions(&self, comment_id: CommentId) -> (Vec<Address>, Vec<Address>) {
        (
            members(&self.comment_likers, comment_id),
            members(&self.comment_dislikers, comment_id),
        )
    }

    pub fn balance_of(&self, account: &Address) -> Wei {
        self.balances.get(account).copied().unwrap_or_default()
    }

    pub fn contract_balance(&self) -> Wei {
        self.contract_balance
    }

    // =========================================================================
    // Internal guards and transfers
    // =========================================================================

    fn existing_post(&self, post_id: PostId) -> Result<&PostRecord, Revert> {
        self.posts
            .get(&post_id)
            .ok_or_else(|| Revert::new("Post does not exist"))
    }

    fn active_post(&self, post_id: PostId) -> Result<&PostRecord, Revert> {
        let post = self.existing_post(post_id)?;
        require(post.is_active, "Post is not active")?;
        Ok(post)
    }

    fn active_comment(&self, comment_id: CommentId) -> Result<&CommentRecord, Revert> {
        let comment = self
            .comments
            .get(&comment_id)
            .ok_or_else(|| Revert::new("Comment does not exist"))?;
        require(comment.is_active, "Comment is not active")?;
        Ok(comment)
    }

    fn only_owner(&self, ctx: &CallContext) -> Result<(), Revert> {
        require(
            !self.owner.is_zero() && self.owner == ctx.sender,
            "Ownable: caller is not the owner",
        )
    }

    fn require_funds(&self, ctx: &CallContext) -> Result<(), Revert> {
        require(
            self.balance_of(&ctx.sender) >= ctx.value,
            "Insufficient balance",
        )?;
        require(
            self.contract_balance.checked_add(ctx.value).is_some(),
            "Balance overflow",
        )
    }

    /// Move the attached value from the sender into the contract.
    /// Callers must have passed `require_funds` first.
    fn escrow_value(&mut self, ctx: &CallContext) {
        if ctx.value.is_zero() {
            return;
        }
        let balance = self.balances.entry(ctx.sender.clone()).or_default();
        *balance = balance.checked_sub(ctx.value).unwrap_or_default();
        self.contract_balance = self
            .contract_balance
            .checked_add(ctx.value)
            .unwrap_or(self.contract_balance);
    }

    /// Move funds out of the contract. Callers must have checked the
    /// contract balance first.
    fn pay_out(&mut self, to: &Address, amount: Wei) {
        self.contract_balance = self.contract_balance.checked_sub(amount).unwrap_or_default();
        let balance = self.balances.entry(to.clone()).or_default();
        *balance = balance.checked_add(amount).unwrap_or(Wei(u128::MAX));
    }

    fn set_owner(&mut self, new_owner: Address) -> LedgerEvent {
        let previous_owner = std::mem::replace(&mut self.owner, new_owner.clone());
        LedgerEvent::OwnershipTransferred {
            previous_owner,
            new_owner,
        }
    }
}

fn require_no_value(ctx: &CallContext) -> Result<(), Revert> {
    require(ctx.value.is_zero(), "Function is not payable")
}

fn has(sets: &ReactionSets<u64>, id: u64, account: &Address) -> bool {
    sets.get(&id).is_some_and(|set| set.contains(account))
}

fn count(sets: &ReactionSets<u64>, id: u64) -> u64 {
    sets.get(&id).map(|set| set.len() as u64).unwrap_or(0)
}

fn members(sets: &ReactionSets<u64>, id: u64) -> Vec<Address> {
    sets.get(&id)
        .map(|set| set.iter().cloned().collect())
        .unwrap_or_default()
}

/// Add `account` to `chosen` and drop it from `opposite`
fn react(
    chosen: &mut ReactionSets<u64>,
    opposite: &mut ReactionSets<u64>,
    id: u64,
    account: &Address,
) {
    if let Some(set) = opposite.get_mut(&id) {
        set.remove(account);
    }
    chosen.entry(id).or_default().insert(account.clone());
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(n: u8) -> Address {
        Address::parse(&format!("0x{:040x}", n)).unwrap()
    }

    fn funded(owner: u8) -> ViviContract {
        let mut contract = ViviContract::new(addr(owner));
        for n in 1..=4 {
            contract.credit(&addr(n), Wei::ether(10));
        }
        contract
    }

    #[test]
    fn test_create_post_with_bounty_escrows_value() {
        let mut c = funded(9);
        let ctx = CallContext::new(addr(1)).with_value(Wei::ether(1));
        let outcome = c.create_post(&ctx, "QmTest123", ContentType::Text).unwrap();

        assert_eq!(outcome.issued_id, Some(1));
        let post = c.post(1).unwrap();
        assert_eq!(post.creator, addr(1));
        assert_eq!(post.content_hash, "QmTest123");
        assert_eq!(post.bounty_amount, Wei::ether(1));
        assert!(post.is_active);
        assert_eq!(c.contract_balance(), Wei::ether(1));
        assert_eq!(c.balance_of(&addr(1)), Wei::ether(9));
    }

    #[test]
    fn test_create_post_without_funds_reverts_cleanly() {
        let mut c = ViviContract::new(addr(9));
        let ctx = CallContext::new(addr(1)).with_value(Wei(5));
        let err = c.create_post(&ctx, "QmTest123", ContentType::Text).unwrap_err();

        assert_eq!(err.reason(), "Insufficient balance");
        assert_eq!(c.post_count(), 0);
        assert!(c.post(1).is_none());
    }

    #[test]
    fn test_anyone_can_top_up_bounty() {
        let mut c = funded(9);
        c.create_post(&CallContext::new(addr(1)), "QmTest123", ContentType::Text)
            .unwrap();
        let outcome = c
            .add_bounty_to_post(&CallContext::new(addr(2)).with_value(Wei::ether(1)), 1)
            .unwrap();

        assert_eq!(c.post(1).unwrap().bounty_amount, Wei::ether(1));
        assert!(matches!(
            outcome.events[0],
            LedgerEvent::BountyAdded { post_id: 1, .. }
        ));
    }

    #[test]
    fn test_zero_bounty_top_up_reverts() {
        let mut c = funded(9);
        c.create_post(&CallContext::new(addr(1)), "QmTest123", ContentType::Text)
            .unwrap();
        let err = c.add_bounty_to_post(&CallContext::new(addr(2)), 1).unwrap_err();
        assert_eq!(err.reason(), "Bounty amount must be greater than 0");
    }

    #[test]
    fn test_award_requires_creator_and_bounty() {
        let mut c = funded(9);
        c.create_post(
            &CallContext::new(addr(1)).with_value(Wei::ether(1)),
            "QmTest123",
            ContentType::Text,
        )
        .unwrap();

        let err = c
            .award_bounty(&CallContext::new(addr(2)), 1, &addr(2))
            .unwrap_err();
        assert_eq!(err.reason(), "Only post creator can award bounty");

        c.award_bounty(&CallContext::new(addr(1)), 1, &addr(3)).unwrap();
        let err = c
            .award_bounty(&CallContext::new(addr(1)), 1, &addr(3))
            .unwrap_err();
        assert_eq!(err.reason(), "No bounty to award");
    }

    #[test]
    fn test_award_to_zero_address_reverts() {
        let mut c = funded(9);
        c.create_post(
            &CallContext::new(addr(1)).with_value(Wei(10)),
            "QmTest123",
            ContentType::Text,
        )
        .unwrap();
        let err = c
            .award_bounty(&CallContext::new(addr(1)), 1, &Address::zero())
            .unwrap_err();
        assert_eq!(err.reason(), "Invalid winner address");
        assert_eq!(c.post(1).unwrap().bounty_amount, Wei(10));
    }

    #[test]
    fn test_cancel_deactivates_and_blocks_interaction() {
        let mut c = funded(9);
        c.create_post(&CallContext::new(addr(1)), "QmTest123", ContentType::Voice)
            .unwrap();
        c.cancel_post(&CallContext::new(addr(1)), 1).unwrap();

        assert!(!c.post(1).unwrap().is_active);
        let err = c.like_post(&CallContext::new(addr(2)), 1).unwrap_err();
        assert_eq!(err.reason(), "Post is not active");
        let err = c
            .add_comment(&CallContext::new(addr(2)), 1, "QmC", ContentType::Text, false)
            .unwrap_err();
        assert_eq!(err.reason(), "Post is not active");
    }

    #[test]
    fn test_non_payable_rejects_value() {
        let mut c = funded(9);
        c.create_post(&CallContext::new(addr(1)), "QmTest123", ContentType::Text)
            .unwrap();
        let err = c
            .like_post(&CallContext::new(addr(2)).with_value(Wei(1)), 1)
            .unwrap_err();
        assert_eq!(err.reason(), "Function is not payable");
        assert!(!c.has_liked_post(&addr(2), 1));
    }

    #[test]
    fn test_post_comments_are_ordered() {
        let mut c = funded(9);
        c.create_post(&CallContext::new(addr(1)), "QmTest123", ContentType::Text)
            .unwrap();
        for hash in ["QmA", "QmB", "QmC"] {
            c.add_comment(&CallContext::new(addr(2)), 1, hash, ContentType::Text, false)
                .unwrap();
        }
        assert_eq!(c.post_comments(1), &[1, 2, 3]);
        assert_eq!(c.comment_count(), 3);
        assert!(c.post_comments(2).is_empty());
    }

    #[test]
    fn test_ownership_transfer_and_renounce() {
        let mut c = funded(9);
        let err = c
            .transfer_ownership(&CallContext::new(addr(1)), &addr(2))
            .unwrap_err();
        assert_eq!(err.reason(), "Ownable: caller is not the owner");

        let err = c
            .transfer_ownership(&CallContext::new(addr(9)), &Address::zero())
            .unwrap_err();
        assert_eq!(err.reason(), "Ownable: new owner is the zero address");

        c.transfer_ownership(&CallContext::new(addr(9)), &addr(2)).unwrap();
        assert_eq!(c.owner(), &addr(2));

        c.renounce_ownership(&CallContext::new(addr(2))).unwrap();
        assert!(c.owner().is_zero());
        let err = c.recover_eth(&CallContext::new(addr(2))).unwrap_err();
        assert_eq!(err.reason(), "Ownable: caller is not the owner");
    }

    #[test]
    fn test_award_after_recovery_fails_transfer() {
        let mut c = funded(9);
        c.create_post(
            &CallContext::new(addr(1)).with_value(Wei(100)),
            "QmTest123",
            ContentType::Text,
        )
        .unwrap();
        c.recover_eth(&CallContext::new(addr(9))).unwrap();

        let err = c
            .award_bounty(&CallContext::new(addr(1)), 1, &addr(2))
            .unwrap_err();
        assert_eq!(err.reason(), "Transfer failed");
        assert_eq!(c.post(1).unwrap().bounty_amount, Wei(100));
    }

    /// Post 1 by addr(1) with one comment by addr(2)
    fn with_comment() -> ViviContract {
        let mut c = funded(9);
        c.create_post(&CallContext::new(addr(1)), "QmTest123", ContentType::Text)
            .unwrap();
        c.add_comment(&CallContext::new(addr(2)), 1, "QmC", ContentType::Text, false)
            .unwrap();
        c
    }

    #[test]
    fn test_post_like_then_dislike_moves_vote() {
        let mut c = with_comment();
        let voter = addr(3);
        c.like_post(&CallContext::new(voter.clone()), 1).unwrap();
        assert!(c.has_liked_post(&voter, 1));

        c.dislike_post(&CallContext::new(voter.clone()), 1).unwrap();
        assert!(!c.has_liked_post(&voter, 1));
        assert!(c.has_disliked_post(&voter, 1));
        assert_eq!(c.post_likes(1), 0);
        assert_eq!(c.post_dislikes(1), 1);

        c.like_post(&CallContext::new(voter.clone()), 1).unwrap();
        assert!(c.has_liked_post(&voter, 1));
        assert!(!c.has_disliked_post(&voter, 1));
        assert_eq!(c.post_reactions(1), (vec![voter], vec![]));
    }

    #[test]
    fn test_comment_like_then_dislike_moves_vote() {
        let mut c = with_comment();
        let voter = addr(3);
        c.like_comment(&CallContext::new(voter.clone()), 1).unwrap();
        c.dislike_comment(&CallContext::new(voter.clone()), 1).unwrap();

        assert!(!c.has_liked_comment(&voter, 1));
        assert!(c.has_disliked_comment(&voter, 1));
        assert_eq!(c.comment_likes(1), 0);
        assert_eq!(c.comment_dislikes(1), 1);
    }

    #[test]
    fn test_repeated_post_reaction_reverts_without_change() {
        let mut c = with_comment();
        let voter = addr(3);
        c.like_post(&CallContext::new(voter.clone()), 1).unwrap();
        let err = c.like_post(&CallContext::new(voter.clone()), 1).unwrap_err();
        assert_eq!(err.reason(), "Already liked this post");
        assert_eq!(c.post_likes(1), 1);
        assert_eq!(c.post_dislikes(1), 0);

        c.dislike_post(&CallContext::new(voter.clone()), 1).unwrap();
        let err = c.dislike_post(&CallContext::new(voter.clone()), 1).unwrap_err();
        assert_eq!(err.reason(), "Already disliked this post");
        assert_eq!(c.post_likes(1), 0);
        assert_eq!(c.post_dislikes(1), 1);
    }

    #[test]
    fn test_repeated_comment_reaction_reverts_without_change() {
        let mut c = with_comment();
        let voter = addr(3);
        c.like_comment(&CallContext::new(voter.clone()), 1).unwrap();
        let err = c.like_comment(&CallContext::new(voter.clone()), 1).unwrap_err();
        assert_eq!(err.reason(), "Already liked this comment");
        assert_eq!(c.comment_likes(1), 1);
        assert_eq!(c.comment_dislikes(1), 0);

        c.dislike_comment(&CallContext::new(voter.clone()), 1).unwrap();
        let err = c.dislike_comment(&CallContext::new(voter.clone()), 1).unwrap_err();
        assert_eq!(err.reason(), "Already disliked this comment");
        assert_eq!(c.comment_likes(1), 0);
        assert_eq!(c.comment_dislikes(1), 1);
    }

    #[test]
    fn test_anonymous_comment_records_zero_commenter() {
        let mut c = with_comment();
        let outcome = c
            .add_comment(&CallContext::new(addr(3)), 1, "QmAnon", ContentType::Voice, true)
            .unwrap();
        assert_eq!(outcome.issued_id, Some(2));

        let comment = c.comment(2).unwrap();
        assert!(comment.is_anonymous);
        assert!(comment.commenter.is_zero());
        assert!(matches!(
            &outcome.events[0],
            LedgerEvent::CommentAdded { commenter, is_anonymous: true, .. } if commenter.is_zero()
        ));

        // Nobody holds the zero address, so the comment is frozen
        let err = c
            .delete_comment(&CallContext::new(addr(3)), 2)
            .unwrap_err();
        assert_eq!(err.reason(), "Only commenter can delete comment");
    }

    #[test]
    fn test_only_commenter_edits_or_deletes() {
        let mut c = with_comment();
        let err = c
            .edit_comment(&CallContext::new(addr(1)), 1, "QmNew")
            .unwrap_err();
        assert_eq!(err.reason(), "Only commenter can edit comment");
        let err = c.delete_comment(&CallContext::new(addr(3)), 1).unwrap_err();
        assert_eq!(err.reason(), "Only commenter can delete comment");

        let comment = c.comment(1).unwrap();
        assert_eq!(comment.content_hash, "QmC");
        assert!(comment.is_active);

        c.edit_comment(&CallContext::new(addr(2)), 1, "QmNew").unwrap();
        assert_eq!(c.comment(1).unwrap().content_hash, "QmNew");
        c.delete_comment(&CallContext::new(addr(2)), 1).unwrap();
        assert!(!c.comment(1).unwrap().is_active);
    }

    #[test]
    fn test_recover_eth_sweeps_escrow_to_owner() {
        let mut c = funded(9);
        c.create_post(
            &CallContext::new(addr(1)).with_value(Wei(100)),
            "QmA",
            ContentType::Text,
        )
        .unwrap();
        c.create_post(
            &CallContext::new(addr(2)).with_value(Wei(50)),
            "QmB",
            ContentType::Text,
        )
        .unwrap();

        let err = c.recover_eth(&CallContext::new(addr(1))).unwrap_err();
        assert_eq!(err.reason(), "Ownable: caller is not the owner");

        let owner_before = c.balance_of(&addr(9));
        let outcome = c.recover_eth(&CallContext::new(addr(9))).unwrap();
        assert!(matches!(
            outcome.events[0],
            LedgerEvent::EmergencyEthRecovered { amount: Wei(150) }
        ));
        assert_eq!(c.contract_balance(), Wei::ZERO);
        assert_eq!(c.balance_of(&addr(9)), owner_before.checked_add(Wei(150)).unwrap());

        let err = c.recover_eth(&CallContext::new(addr(9))).unwrap_err();
        assert_eq!(err.reason(), "No ETH to recover");
    }
}
