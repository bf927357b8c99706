pub struct OperationMessages {
    pub starting: &'static str,
    pub success: &'static str,
    pub failed: &'static str,
}

pub struct LifecycleOperations {
    pub create: OperationMessages,
    pub start: OperationMessages,
    pub stop: OperationMessages,
    pub delete: OperationMessages,
}

pub const CLUSTER_OPS: LifecycleOperations = LifecycleOperations {
    create: OperationMessages {
        starting: "Creating cluster '{name}'...",
        success: "Cluster '{name}' created",
        failed: "❌ Failed to create cluster '{name}'",
    },
    start: OperationMessages {
        starting: "Starting cluster '{name}'...",
        success: "Cluster '{name}' started",
        failed: "❌ Failed to start cluster '{name}'",
    },
    stop: OperationMessages {
        starting: "Stopping cluster '{name}'...",
        success: "Cluster '{name}' stopped",
        failed: "❌ Failed to stop cluster '{name}'",
    },
    delete: OperationMessages {
        starting: "Deleting cluster '{name}'...",
        success: "Cluster '{name}' deleted",
        failed: "❌ Failed to delete cluster '{name}'",
    },
};

pub const REGISTRY_OPS: LifecycleOperations = LifecycleOperations {
    create: OperationMessages {
        starting: "Creating registry '{name}'...",
        success: "Registry '{name}' ready",
        failed: "❌ Failed to create registry '{name}'",
    },
    start: OperationMessages {
        starting: "Starting registry '{name}'...",
        success: "Registry '{name}' started",
        failed: "❌ Failed to start registry '{name}'",
    },
    stop: OperationMessages {
        starting: "Stopping registry '{name}'...",
        success: "Registry '{name}' stopped",
        failed: "❌ Failed to stop registry '{name}'",
    },
    delete: OperationMessages {
        starting: "Removing registry '{name}'...",
        success: "Registry '{name}' removed",
        failed: "❌ Failed to remove registry '{name}'",
    },
};
