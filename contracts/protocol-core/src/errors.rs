use soroban_sdk::contracterror;

/// Stable error taxonomy for the whole protocol.
///
/// Codes 1..=17 are the frozen public contract; external callers switch on
/// them and they must never be renumbered. Codes from 18 up cover the
/// supplementary surface (org metadata, comments, input validation) and are
/// stable too, but are not part of the frozen core set.
#[contracterror]
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum ProtocolError {
    /// Operation requires org admin privileges.
    NotAdmin = 1,
    /// Caller lacks org membership.
    NotMember = 2,
    /// Duplicate badge mint.
    AlreadyMember = 3,
    /// `self_join` on an org with closed membership.
    MembershipClosed = 4,
    /// Tree not yet initialized for this org.
    NotInitialized = 5,
    /// Second initialization attempt.
    AlreadyInitialized = 6,
    /// Tree capacity reached.
    Full = 7,
    /// Commitment already occupies a live leaf.
    DuplicateCommitment = 8,
    /// Field element is >= the BN254 scalar modulus.
    FieldOverflow = 9,
    /// No verification key registered.
    VkNotSet = 10,
    ProposalNotFound = 11,
    /// Proposal closed by the admin or past its end time.
    ProposalClosed = 12,
    /// Fixed-mode vote bound to a root other than the proposal snapshot.
    RootMismatch = 13,
    /// Trailing-mode vote bound to a root absent from the recent-roots ring.
    RootUnknown = 14,
    NullifierReused = 15,
    /// Pairing check returned false.
    ProofInvalid = 16,
    /// Bad point encoding: wrong length, coordinate >= q, or off-curve.
    MalformedProof = 17,

    OrgNotFound = 18,
    NameTooLong = 19,
    InvalidDepth = 20,
    LeafOutOfBounds = 21,
    /// `reinstate` target slot still holds a live commitment.
    LeafNotEmpty = 22,
    /// `remove` target slot is already zero.
    LeafAlreadyEmpty = 23,
    EndTimeInPast = 24,
    CommentNotFound = 25,
    CommentDeleted = 26,
    NotCommentOwner = 27,
    ContentRefTooLong = 28,
    InvalidParentComment = 29,
    /// Collaborator contract address was never configured.
    ContractNotSet = 30,
}
