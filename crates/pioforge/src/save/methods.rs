//! Save subtypes, grouped the way the sub-handlers claim them.
//!
//! On the wire a subtype is the constant's own name (`"TASK_STARTED"`),
//! carried in `data._type` of the save body.

macro_rules! save_types {
    ($(#[$meta:meta])* $group:ident { $($name:ident),+ $(,)? }) => {
        $(#[$meta])*
        pub mod $group {
            $(pub const $name: &str = stringify!($name);)+

            /// Every subtype in this group.
            pub const ALL: &[&str] = &[$($name),+];
        }
    };
}

save_types!(alliance {
    ALLIANCE_COLLECT_WINNINGS,
    ALLIANCE_CREATE,
    ALLIANCE_EFFECT_UPDATE,
    ALLIANCE_GET_LIFETIMESTATS,
    ALLIANCE_GET_PREV_ROUND_RESULT,
    ALLIANCE_INFORM_ABOUT_LEAVE,
    ALLIANCE_QUERY_WINNINGS,
});

save_types!(arena {
    ARENA_ABORT,
    ARENA_CONTINUE,
    ARENA_DEATH,
    ARENA_FINISH,
    ARENA_LEADER,
    ARENA_LEADERBOARD,
    ARENA_START,
    ARENA_UPDATE,
});

save_types!(bounty {
    BOUNTY_ABANDON,
    BOUNTY_ADD,
    BOUNTY_NEW,
    BOUNTY_SPEED_UP,
    BOUNTY_VIEW,
});

save_types!(chat {
    CHAT_ADD_BLOCK,
    CHAT_ADD_CONTACT,
    CHAT_GET_CONTACTS_AND_BLOCKS,
    CHAT_KICKED,
    CHAT_MIGRATE_CONTACTS_AND_BLOCKS,
    CHAT_REMOVE_ALL_BLOCKS,
    CHAT_REMOVE_ALL_CONTACTS,
    CHAT_REMOVE_BLOCK,
    CHAT_REMOVE_CONTACT,
    CHAT_SILENCED,
});

save_types!(
    /// Buildings on the player's compound.
    compound_building {
        BUILDING_CANCEL,
        BUILDING_COLLECT,
        BUILDING_CREATE,
        BUILDING_CREATE_BUY,
        BUILDING_MOVE,
        BUILDING_RECYCLE,
        BUILDING_REPAIR,
        BUILDING_REPAIR_BUY,
        BUILDING_REPAIR_SPEED_UP,
        BUILDING_SPEED_UP,
        BUILDING_TRAP_EXPLODE,
        BUILDING_UPGRADE,
        BUILDING_UPGRADE_BUY,
    }
);

save_types!(compound_misc {
    AH_EVENT,
    CRAFT_ITEM,
    CRAFT_SCHEMATIC,
    CRAFT_UPGRADE,
    CULL_NEIGHBORS,
    EFFECT_SET,
    RALLY_ASSIGNMENT,
    RESEARCH_START,
});

save_types!(
    /// Timed survivor tasks such as junk removal.
    compound_task {
        TASK_CANCELLED,
        TASK_SPEED_UP,
        TASK_STARTED,
        TASK_SURVIVOR_ASSIGNED,
        TASK_SURVIVOR_REMOVED,
    }
);

save_types!(crate_unlock { CRATE_MYSTERY_UNLOCK, CRATE_UNLOCK });

save_types!(item {
    ITEM,
    ITEM_BATCH_DISPOSE,
    ITEM_BATCH_RECYCLE,
    ITEM_BATCH_RECYCLE_SPEED_UP,
    ITEM_BUY,
    ITEM_CLEAR_NEW,
    ITEM_DISPOSE,
    ITEM_LIST,
    ITEM_RECYCLE,
});

save_types!(misc {
    CLEAR_NOTIFICATIONS,
    FLUSH_PLAYER,
    GET_INVENTORY_SIZE,
    GET_OFFERS,
    NEWS_READ,
    SAVE_ALT_IDS,
    TRADE_DO_TRADE,
    TUTORIAL_COMPLETE,
    TUTORIAL_PVP_PRACTICE,
});

save_types!(mission {
    MISSION_ELITE_KILLED,
    MISSION_ELITE_SPAWNED,
    MISSION_END,
    MISSION_INJURY,
    MISSION_INTERACTION_FLAG,
    MISSION_ITEM_USE,
    MISSION_SCOUTED,
    MISSION_SPEED_UP,
    MISSION_START,
    MISSION_START_FLAG,
    MISSION_TRIGGER,
    MISSION_ZOMBIES,
    STAT,
    STAT_DATA,
});

save_types!(purchase {
    BUY_PACKAGE,
    CHECK_APPLY_DIRECT_PURCHASE,
    CLAIM_PROMO_CODE,
    DEATH_MOBILE_RENAME,
    HAS_PAYVAULT_ITEM,
    INCREMENT_PURCHASE_COUNT,
    PAYVAULT_BUY,
    PROTECTION_BUY,
    RESOURCE_BUY,
});

save_types!(quest {
    GLOBAL_QUEST_COLLECT,
    QUEST_COLLECT,
    QUEST_DAILY_ACCEPT,
    QUEST_DAILY_DECLINE,
    QUEST_TRACK,
    QUEST_UNTRACK,
    REPEAT_ACHIEVEMENT,
});

save_types!(raid { RAID_ABORT, RAID_CONTINUE, RAID_DEATH, RAID_START });

save_types!(survivor {
    NAMES,
    PLAYER_CUSTOM,
    RESET_LEADER,
    SURVIVOR_BUY,
    SURVIVOR_CLASS,
    SURVIVOR_CLOTHING_LOADOUT,
    SURVIVOR_DEFENCE_LOADOUT,
    SURVIVOR_EDIT,
    SURVIVOR_ENEMY_INJURE,
    SURVIVOR_HEAL_ALL,
    SURVIVOR_HEAL_INJURY,
    SURVIVOR_INJURE,
    SURVIVOR_INJURY_SPEED_UP,
    SURVIVOR_OFFENCE_LOADOUT,
    SURVIVOR_REASSIGN,
    SURVIVOR_REASSIGN_SPEED_UP,
    SURVIVOR_RENAME,
});
