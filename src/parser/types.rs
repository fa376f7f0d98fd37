use serde::{Deserialize, Serialize};
use std::fmt;

/// One canned procedure the runner knows how to perform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    CreateEquipment,
    ListEquipment,
    EditEquipment,
    DeleteEquipment,
    CreateMaintenance,
    ListMaintenance,
    EditMaintenance,
    TestLogin,
    TestLogout,
    TestSession,
    TestPermissions,
    TestUnauthorizedAccess,
    TestAuthorizedAccess,
    ExploreAllLinks,
    ExplorePageElements,
    TestNavigation,
    TestFormValidation,
    TestErrorHandling,
    TestDataSave,
    TestDataRetrieval,
    ClearDatabase,
    ComprehensiveTest,
}

impl Action {
    /// Snake-case identifier, as used in scenario tables and reports
    pub fn id(&self) -> &'static str {
        match self {
            Action::CreateEquipment => "create_equipment",
            Action::ListEquipment => "list_equipment",
            Action::EditEquipment => "edit_equipment",
            Action::DeleteEquipment => "delete_equipment",
            Action::CreateMaintenance => "create_maintenance",
            Action::ListMaintenance => "list_maintenance",
            Action::EditMaintenance => "edit_maintenance",
            Action::TestLogin => "test_login",
            Action::TestLogout => "test_logout",
            Action::TestSession => "test_session",
            Action::TestPermissions => "test_permissions",
            Action::TestUnauthorizedAccess => "test_unauthorized_access",
            Action::TestAuthorizedAccess => "test_authorized_access",
            Action::ExploreAllLinks => "explore_all_links",
            Action::ExplorePageElements => "explore_page_elements",
            Action::TestNavigation => "test_navigation",
            Action::TestFormValidation => "test_form_validation",
            Action::TestErrorHandling => "test_error_handling",
            Action::TestDataSave => "test_data_save",
            Action::TestDataRetrieval => "test_data_retrieval",
            Action::ClearDatabase => "clear_database",
            Action::ComprehensiveTest => "comprehensive_test",
        }
    }

    /// Human readable test name used in results
    pub fn test_name(&self) -> &'static str {
        match self {
            Action::CreateEquipment => "Create Equipment Test",
            Action::ListEquipment => "List Equipment Test",
            Action::EditEquipment => "Edit Equipment Test",
            Action::DeleteEquipment => "Delete Equipment Test",
            Action::CreateMaintenance => "Create Maintenance Test",
            Action::ListMaintenance => "List Maintenance Test",
            Action::EditMaintenance => "Edit Maintenance Test",
            Action::TestLogin => "Login Test",
            Action::TestLogout => "Logout Test",
            Action::TestSession => "Session Persistence Test",
            Action::TestPermissions => "Permission Test",
            Action::TestUnauthorizedAccess => "Unauthorized Access Test",
            Action::TestAuthorizedAccess => "Authorized Access Test",
            Action::ExploreAllLinks => "Explore All Links Test",
            Action::ExplorePageElements => "Explore Page Elements Test",
            Action::TestNavigation => "Navigation Test",
            Action::TestFormValidation => "Form Validation Test",
            Action::TestErrorHandling => "Error Handling Test",
            Action::TestDataSave => "Data Save Test",
            Action::TestDataRetrieval => "Data Retrieval Test",
            Action::ClearDatabase => "Clear Database (Danger Zone) Test",
            Action::ComprehensiveTest => "Comprehensive Test",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

/// A single action selected from a free-text request
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TestRequest {
    pub action: Action,
    pub priority: u8,
    pub flags: Vec<&'static str>,
    pub description: &'static str,
}

/// A named bundle of trigger keywords and an ordered action list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestScenario {
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    pub actions: Vec<Action>,
    #[serde(default)]
    pub requires_auth: bool,
    #[serde(default = "default_priority")]
    pub priority: u8,
}

fn default_priority() -> u8 {
    1
}

/// Role the request asks the runner to act as
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Manager,
    Technician,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Manager => "manager",
            Role::Technician => "technician",
        }
    }
}

/// Account and role extracted from a request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserContext {
    pub username: String,
    #[serde(skip_serializing)]
    pub password: String,
    pub role: Role,
}
