//! DTOs module - Data Transfer Objects
//!
//! I DTOs separano la rappresentazione esterna (API) dalla rappresentazione interna (entities).

pub mod admin;
pub mod auth;
pub mod conversation;
pub mod facegate;
pub mod post;
pub mod query;
pub mod task;
pub mod user;
pub mod voice;
pub mod wallet;

pub use admin::{
    AdminCreateUserRequest, AdminUpdateUserRequest, AdminUserDTO, AdminUserListDTO,
    AdminUserQuery, PaginationDTO, STANDARD_VOICES, UpdateVoiceMappingRequest,
    VoiceMappingBatchDTO, VoiceMappingBatchRequest, VoiceMappingDTO, VoiceMappingItem,
    VoiceMappingListDTO, VoiceMappingResultDTO, is_custom_voice, is_valid_voice_id,
};
pub use auth::{
    AuthResponse, LoginRequest, RegisterRequest, SendSmsRequest, SendSmsResponse, SmsMode,
    SuccessDTO, VerifySmsRequest,
};
pub use conversation::{
    ConversationDTO, CreateConversationRequest, CreateMessageDTO, MarkReadDTO, MessageDTO,
    MessageSearchQuery, SendMessageRequest, UploadedFileDTO,
};
pub use facegate::{
    CreateFacegateDeviceDTO, CreateFacegateDeviceRequest, FacegateDeviceDTO, FacegateListDTO,
};
pub use post::{
    CommentDTO, CreateCommentDTO, CreateCommentRequest, CreatePostDTO, CreatePostRequest,
    DeletedDTO, FeedQuery, PostDTO, PostMediaDTO, SortDirection, VisualMediaDTO,
};
pub use query::{PageQuery, UserListQuery};
pub use task::{
    CompletionAction, ConfirmCompletionRequest, ExpiryReportDTO, TaskActionDTO, TaskActionRequest,
};
pub use user::{
    ChangePasswordRequest, CreateUserDTO, FollowRequestDTO, PhotoKind, PhotoKindQuery, PunkedFollowersDTO,
    TtsSettingsDTO, UpdateUserDTO, UserDTO, UserSummaryDTO,
};
pub use voice::{
    CreateDeviceDTO, CreateDeviceRequest, CreateVoiceMessageDTO, CreateVoiceMessageRequest,
    CreateVoiceRoleDTO, CreateVoiceRoleRequest, DeviceDetailDTO, SessionDetailDTO, SessionListDTO,
    SessionListQuery, StartSessionRequest, UpdateDeviceDTO, VoiceRoleCreatedDTO, VoiceRoleDTO,
    VoiceRoleListDTO,
};
pub use wallet::{
    BalanceDTO, RedPacketDTO, RedPacketRequest, WalletDTO, WalletTransactionDTO,
    format_last_updated,
};
